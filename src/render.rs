//! Terminal output for handler replies.
//!
//! JSON formats print the reply body as-is. Text format decodes the body back
//! into the model type the handler serialized and prints it for humans.

use colored::Colorize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::cli::OutputFormat;
use crate::error::{ChirpError, Result, format_did_you_mean, format_error};
use crate::handlers::Reply;
use crate::model::{
    FollowResult, LikeStatus, NetworkStats, PeerEdge, Profile, Tweet, TweetView, UnfollowResult,
    User,
};
use crate::{CONTENT_DIVIDER_WIDTH, format_number, format_optional_date, format_relative_date};

/// Which handler produced a reply, and so how to print it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Signup,
    AccountDeleted,
    Posted,
    TweetDeleted,
    TweetDetail,
    Follow,
    Unfollow,
    Following,
    Followers,
    Like,
    Unlike,
    Profile,
    Home,
    Stats,
}

fn decode<T: DeserializeOwned>(body: &Value) -> Result<T> {
    serde_json::from_value(body.clone()).map_err(|e| ChirpError::with_context("decode reply", e))
}

/// Print a successful reply to stdout.
///
/// # Errors
///
/// Returns an error if the body does not match the view's model type or
/// JSON encoding fails.
pub fn print_success(view: View, reply: &Reply, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", reply.body);
            return Ok(());
        }
        OutputFormat::JsonPretty => {
            let pretty = serde_json::to_string_pretty(&reply.body)
                .map_err(|e| ChirpError::with_context("encode reply", e))?;
            println!("{pretty}");
            return Ok(());
        }
        OutputFormat::Text => {}
    }

    let body = &reply.body;
    match view {
        View::Signup => {
            let user: User = decode(body)?;
            println!(
                "{} Created {} (id {})",
                "✓".green(),
                format!("@{}", user.handle).bold(),
                user.id
            );
        }
        View::AccountDeleted => {
            let handle = body["deleted"].as_str().unwrap_or_default();
            println!(
                "{} Deleted @{handle} with their tweets, follows and likes",
                "✓".green()
            );
        }
        View::Posted => {
            let tweet: Tweet = decode(body)?;
            println!("{} Posted tweet {}", "✓".green(), tweet.id.to_string().cyan());
        }
        View::TweetDeleted => {
            println!("{} Deleted tweet {}", "✓".green(), body["deleted"]);
        }
        View::TweetDetail => print_tweet(&decode::<TweetView>(body)?),
        View::Follow => {
            let result: FollowResult = decode(body)?;
            println!(
                "{} Following {}. They have {} followers; you follow {}.",
                "✓".green(),
                format!("@{}", result.target_handle).bold(),
                format_number(result.follower_count),
                format_number(result.following_count)
            );
        }
        View::Unfollow => {
            let result: UnfollowResult = decode(body)?;
            if result.removed {
                println!(
                    "{} Unfollowed {}",
                    "✓".green(),
                    format!("@{}", result.target_handle).bold()
                );
            } else {
                println!(
                    "{}",
                    format!("You were not following @{}.", result.target_handle).dimmed()
                );
            }
        }
        View::Following | View::Followers => {
            print_peers(view, &decode::<Vec<PeerEdge>>(body)?);
        }
        View::Like | View::Unlike => {
            let status: LikeStatus = decode(body)?;
            let heart = if status.is_liked {
                "♥".red()
            } else {
                "♡".normal()
            };
            println!(
                "{heart} tweet {} has {} likes",
                status.tweet_id,
                format_number(status.liked_count)
            );
        }
        View::Profile => print_profile(&decode::<Profile>(body)?),
        View::Home => {
            let timeline: Vec<TweetView> = decode(body)?;
            if timeline.is_empty() {
                println!("{}", "No tweets yet.".yellow());
            }
            for view in &timeline {
                print_tweet(view);
            }
        }
        View::Stats => print_stats(&decode::<NetworkStats>(body)?),
    }
    Ok(())
}

/// Print a failed reply to stderr, with a did-you-mean when one is known.
pub fn print_failure(reply: &Reply, format: OutputFormat, did_you_mean: Option<&str>) {
    if format != OutputFormat::Text {
        eprintln!("{}", reply.body);
        return;
    }

    let message = reply.error_message().unwrap_or("request failed");
    let mut hints: Vec<String> = Vec::new();
    if let Some(candidate) = did_you_mean {
        hints.push(format_did_you_mean(candidate));
    }
    if let Some(hint) = reply.body.get("suggestion").and_then(Value::as_str) {
        hints.push(hint.to_string());
    }
    let hints: Vec<&str> = hints.iter().map(String::as_str).collect();
    eprintln!(
        "{}",
        format_error(message, &format!("status {}", reply.status), &hints)
    );
}

fn print_tweet(view: &TweetView) {
    println!(
        "{} {} {}",
        format!("@{}", view.author_handle).bold(),
        format!("#{}", view.tweet.id).dimmed(),
        format_relative_date(view.tweet.created_at).dimmed()
    );
    for line in textwrap::wrap(&view.tweet.content, CONTENT_DIVIDER_WIDTH) {
        println!("  {line}");
    }
    let heart = if view.is_liked {
        "♥".red()
    } else {
        "♡".normal()
    };
    println!("  {heart} {}", format_number(view.liked_count));
    println!("{}", "─".repeat(CONTENT_DIVIDER_WIDTH).dimmed());
}

fn print_peers(view: View, peers: &[PeerEdge]) {
    if peers.is_empty() {
        let empty = if view == View::Followers {
            "No followers."
        } else {
            "Not following anyone."
        };
        println!("{}", empty.yellow());
        return;
    }
    for peer in peers {
        println!(
            "  {:<24} {}",
            format!("@{}", peer.handle),
            format!("since {}", format_relative_date(peer.created_at)).dimmed()
        );
    }
}

fn print_profile(profile: &Profile) {
    println!("{}", format!("@{}", profile.user.handle).bold().cyan());
    println!(
        "  {} following  {} followers  joined {}",
        format_number(profile.following_count).bold(),
        format_number(profile.follower_count).bold(),
        format_relative_date(profile.user.created_at)
    );
    if profile.is_following {
        println!("  {}", "You follow this user.".green());
    }
    println!("{}", "─".repeat(CONTENT_DIVIDER_WIDTH));
    if profile.tweets.is_empty() {
        println!("{}", "No tweets yet.".yellow());
    }
    for tweet in &profile.tweets {
        print_tweet(tweet);
    }
}

fn print_stats(stats: &NetworkStats) {
    println!("{}", "Network Statistics".bold().cyan());
    println!("{}", "─".repeat(40));
    println!("  {:<20} {:>10}", "Users:", format_number(stats.users_count));
    println!("  {:<20} {:>10}", "Tweets:", format_number(stats.tweets_count));
    println!("  {:<20} {:>10}", "Follows:", format_number(stats.follows_count));
    println!("  {:<20} {:>10}", "Likes:", format_number(stats.likes_count));
    println!("{}", "─".repeat(40));
    println!("  First tweet: {}", format_optional_date(stats.first_tweet_date));
    println!("  Last tweet:  {}", format_optional_date(stats.last_tweet_date));
}
