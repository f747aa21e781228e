//! CLI definitions for chirp.
//!
//! Uses clap for argument parsing with derive macros.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::model::TweetId;

/// chirp - a tiny microblog in your terminal
#[derive(Parser, Debug)]
#[command(name = "chirp")]
#[command(version)]
#[command(about = "Post, follow and like on a local microblog")]
#[command(long_about = r#"
chirp - a small Twitter-like network stored in a single SQLite file.

Every command except signup, stats and doctor runs as the user named
by --as (or CHIRP_USER), signed in with --password (or CHIRP_PASSWORD).
Replies carry an HTTP-style status; anything other than 2xx makes chirp
exit with a non-zero code.

Quick start:
  1. export CHIRP_PASSWORD='choose-a-good-one'
  2. chirp signup alice -e alice@example.com
  3. chirp signup bob -e bob@example.com
  4. chirp --as bob post "hello"
  5. chirp --as alice follow bob
  6. chirp --as alice like 1
"#)]
pub struct Cli {
    /// Path to the database file
    #[arg(long, env = "CHIRP_DB", global = true)]
    pub db: Option<PathBuf>,

    /// Handle of the user to act as
    #[arg(long = "as", value_name = "HANDLE", env = "CHIRP_USER", global = true)]
    pub as_user: Option<String>,

    /// Password of the --as user; for signup, the new account's password
    #[arg(long, env = "CHIRP_PASSWORD", hide_env_values = true, global = true)]
    pub password: Option<String>,

    /// Output format (defaults to the config file's output.format)
    #[arg(long, short = 'f', global = true)]
    pub format: Option<OutputFormat>,

    /// Be verbose (show debug info)
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Be quiet (suppress non-error output)
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create an account
    Signup(SignupArgs),

    /// Delete your account, your tweets, follows and likes
    DeleteAccount,

    /// Post a tweet
    Post(PostArgs),

    /// Delete one of your tweets
    Delete(TweetIdArgs),

    /// Show a tweet with its like count
    Tweet(TweetIdArgs),

    /// Follow a user
    Follow(HandleArgs),

    /// Stop following a user
    Unfollow(HandleArgs),

    /// List the users someone follows
    Following(ListArgs),

    /// List the users following someone
    Followers(ListArgs),

    /// Like a tweet
    Like(TweetIdArgs),

    /// Remove your like from a tweet
    Unlike(TweetIdArgs),

    /// Show a user's profile and tweets
    Profile(ListArgs),

    /// Show the home timeline
    Home(HomeArgs),

    /// Show network statistics
    Stats,

    /// Run health checks on the database
    Doctor,

    /// Show or manage configuration
    Config(ConfigArgs),

    /// Start an interactive shell as the --as user
    Shell,

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args, Debug)]
pub struct SignupArgs {
    /// Handle for the new account (letters, digits and @/./+/-/_)
    pub handle: String,

    /// Email address
    #[arg(long, short = 'e')]
    pub email: String,

    /// Password typed a second time (defaults to --password)
    #[arg(long, value_name = "PASSWORD")]
    pub confirm_password: Option<String>,
}

#[derive(Args, Debug)]
pub struct PostArgs {
    /// Tweet text, at most 200 characters
    pub content: String,
}

#[derive(Args, Debug)]
pub struct TweetIdArgs {
    /// Tweet ID
    pub id: TweetId,
}

#[derive(Args, Debug)]
pub struct HandleArgs {
    /// Handle of the other user
    pub handle: String,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Handle of the user to show
    pub handle: String,

    /// Limit number of items
    #[arg(long, short = 'n')]
    pub limit: Option<usize>,
}

#[derive(Args, Debug)]
pub struct HomeArgs {
    /// Limit number of tweets
    #[arg(long, short = 'n', default_value = "20")]
    pub limit: usize,
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Show the effective configuration
    #[arg(long)]
    pub show: bool,

    /// Write a default config file if none exists
    #[arg(long)]
    pub init: bool,
}

#[derive(Args, Debug, Clone)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    JsonPretty,
}
