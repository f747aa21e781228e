//! Interactive shell for chirp.
//!
//! Every command runs as the user the shell was started for, through the same
//! handlers as the one-shot CLI.

use anyhow::{Context, Result};
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{CompletionType, Config, EditMode, Editor};
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::cli::OutputFormat;
use crate::guard::{Caller, Session};
use crate::handlers::{self, Reply};
use crate::model::TweetId;
use crate::render::{self, View};
use crate::{Storage, truncate_text};

const HOME_LIMIT: usize = 20;

/// REPL session state.
pub struct ReplSession {
    storage: Storage,
    session: Session,
    handle: String,
    format: OutputFormat,
    history_path: PathBuf,
}

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Post { content: String },
    Delete { tweet: TweetId },
    Tweet { tweet: TweetId },
    Follow { handle: String },
    Unfollow { handle: String },
    Following { handle: Option<String> },
    Followers { handle: Option<String> },
    Like { tweet: TweetId },
    Unlike { tweet: TweetId },
    Profile { handle: Option<String> },
    Home { limit: usize },
    Stats,
    Whoami,
    Help { command: Option<String> },
    Quit,
}

/// Run the REPL session as `caller`.
///
/// # Errors
///
/// Returns an error if readline setup or history persistence fails.
pub fn run(storage: Storage, caller: Caller, format: OutputFormat) -> Result<()> {
    let config = Config::builder()
        .history_ignore_space(true)
        .history_ignore_dups(true)?
        .completion_type(CompletionType::List)
        .edit_mode(EditMode::Emacs)
        .build();

    let mut rl: Editor<(), DefaultHistory> = Editor::with_config(config)?;

    let history_path = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".chirp_history");

    let session = ReplSession {
        storage,
        handle: caller.handle.clone(),
        session: Session::Authenticated(caller),
        format,
        history_path,
    };

    if let Err(e) = rl.load_history(&session.history_path) {
        debug!(error = %e, "No shell history loaded");
    }

    info!(handle = %session.handle, "Starting chirp shell");
    println!(
        "{}",
        format!(
            "chirp shell as @{}. Type 'help' for commands, 'quit' to exit.",
            session.handle
        )
        .cyan()
    );
    println!();

    loop {
        let prompt = format!("@{}> ", session.handle);
        match rl.readline(&prompt) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                if !matches!(line, "quit" | "exit" | "q") {
                    rl.add_history_entry(line)?;
                }

                debug!(command = %line, "Shell command");
                match session.execute(line) {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(e) => {
                        warn!(error = %e, "Shell command failed");
                        eprintln!("{}: {e}", "Error".red());
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
            }
            Err(ReadlineError::Eof) => {
                println!();
                break;
            }
            Err(e) => {
                return Err(anyhow::anyhow!(e)).context("Readline failed");
            }
        }
    }

    rl.save_history(&session.history_path)?;
    info!(handle = %session.handle, "Ended chirp shell");
    println!("Bye, @{}!", session.handle);
    Ok(())
}

impl ReplSession {
    fn execute(&self, input: &str) -> Result<bool> {
        let command = parse_command(input)?;
        let storage = &self.storage;
        let session = &self.session;
        let (view, reply) = match command {
            Command::Post { content } => {
                debug!(preview = %truncate_text(&content, 40), "Posting from shell");
                (View::Posted, handlers::post(storage, session, &content))
            }
            Command::Delete { tweet } => (
                View::TweetDeleted,
                handlers::delete_tweet(storage, session, tweet),
            ),
            Command::Tweet { tweet } => (
                View::TweetDetail,
                handlers::tweet_detail(storage, session, tweet),
            ),
            Command::Follow { handle } => {
                (View::Follow, handlers::follow(storage, session, &handle))
            }
            Command::Unfollow { handle } => {
                (View::Unfollow, handlers::unfollow(storage, session, &handle))
            }
            Command::Following { handle } => (
                View::Following,
                handlers::following(
                    storage,
                    session,
                    handle.as_deref().unwrap_or(&self.handle),
                    None,
                ),
            ),
            Command::Followers { handle } => (
                View::Followers,
                handlers::followers(
                    storage,
                    session,
                    handle.as_deref().unwrap_or(&self.handle),
                    None,
                ),
            ),
            Command::Like { tweet } => (View::Like, handlers::like(storage, session, tweet)),
            Command::Unlike { tweet } => (View::Unlike, handlers::unlike(storage, session, tweet)),
            Command::Profile { handle } => (
                View::Profile,
                handlers::profile(
                    storage,
                    session,
                    handle.as_deref().unwrap_or(&self.handle),
                    None,
                ),
            ),
            Command::Home { limit } => (View::Home, handlers::home(storage, session, Some(limit))),
            Command::Stats => (View::Stats, handlers::stats(storage)),
            Command::Whoami => {
                println!("@{}", self.handle.bold());
                return Ok(true);
            }
            Command::Help { command } => {
                print_help(command.as_deref());
                return Ok(true);
            }
            Command::Quit => return Ok(false),
        };
        self.show(view, &reply)?;
        Ok(true)
    }

    fn show(&self, view: View, reply: &Reply) -> Result<()> {
        if reply.is_success() {
            render::print_success(view, reply, self.format)?;
        } else {
            render::print_failure(reply, self.format, None);
        }
        Ok(())
    }
}

fn parse_tweet_id(arg: Option<&&str>) -> Result<TweetId> {
    let raw = arg.context("Missing tweet id.")?;
    raw.parse()
        .with_context(|| format!("'{raw}' is not a tweet id."))
}

fn parse_handle(arg: Option<&&str>) -> Result<String> {
    arg.map(|h| h.trim_start_matches('@').to_string())
        .context("Missing handle.")
}

fn parse_command(input: &str) -> Result<Command> {
    let parts: Vec<&str> = input.split_whitespace().collect();
    if parts.is_empty() {
        anyhow::bail!("Empty command");
    }
    let optional_handle = || parts.get(1).map(|h| h.trim_start_matches('@').to_string());

    match parts[0] {
        "post" | "p" => {
            // Text after the command word, spacing intact.
            let content = input
                .trim()
                .split_once(char::is_whitespace)
                .map_or("", |(_, rest)| rest.trim());
            if content.is_empty() {
                anyhow::bail!("Tweet text cannot be empty.");
            }
            Ok(Command::Post {
                content: content.to_string(),
            })
        }
        "delete" | "rm" => Ok(Command::Delete {
            tweet: parse_tweet_id(parts.get(1))?,
        }),
        "tweet" | "t" => Ok(Command::Tweet {
            tweet: parse_tweet_id(parts.get(1))?,
        }),
        "follow" => Ok(Command::Follow {
            handle: parse_handle(parts.get(1))?,
        }),
        "unfollow" => Ok(Command::Unfollow {
            handle: parse_handle(parts.get(1))?,
        }),
        "following" => Ok(Command::Following {
            handle: optional_handle(),
        }),
        "followers" => Ok(Command::Followers {
            handle: optional_handle(),
        }),
        "like" => Ok(Command::Like {
            tweet: parse_tweet_id(parts.get(1))?,
        }),
        "unlike" => Ok(Command::Unlike {
            tweet: parse_tweet_id(parts.get(1))?,
        }),
        "profile" => Ok(Command::Profile {
            handle: optional_handle(),
        }),
        "home" => {
            let limit = match parts.get(1) {
                Some(raw) => raw
                    .parse()
                    .with_context(|| format!("'{raw}' is not a number."))?,
                None => HOME_LIMIT,
            };
            Ok(Command::Home { limit })
        }
        "stats" => Ok(Command::Stats),
        "whoami" => Ok(Command::Whoami),
        "help" | "h" | "?" => Ok(Command::Help {
            command: parts.get(1).map(ToString::to_string),
        }),
        "quit" | "exit" | "q" => Ok(Command::Quit),
        _ => anyhow::bail!(
            "Unknown command: {}. Type 'help' for available commands.",
            parts[0]
        ),
    }
}

const HELP_LINES: [(&str, &str); 14] = [
    ("post", "post <text>         - post a tweet"),
    ("delete", "delete <id>         - delete one of your tweets"),
    ("tweet", "tweet <id>          - show a tweet"),
    ("follow", "follow <handle>     - follow a user"),
    ("unfollow", "unfollow <handle>   - stop following a user"),
    ("following", "following [handle]  - who a user follows"),
    ("followers", "followers [handle]  - who follows a user"),
    ("like", "like <id>           - like a tweet"),
    ("unlike", "unlike <id>         - remove your like"),
    ("profile", "profile [handle]    - show a profile"),
    ("home", "home [n]            - latest tweets"),
    ("stats", "stats               - network statistics"),
    ("whoami", "whoami              - show who you are"),
    ("quit", "quit                - exit"),
];

fn print_help(command: Option<&str>) {
    let wanted = command.map(|c| if c == "exit" { "quit" } else { c });
    if let Some(line) = wanted.and_then(|c| HELP_LINES.iter().find(|(name, _)| *name == c)) {
        println!("{}", line.1);
        return;
    }
    println!("{}", "Commands:".bold().cyan());
    for (_, line) in HELP_LINES {
        println!("  {line}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_edge_commands() {
        assert_eq!(
            parse_command("follow @bob").unwrap(),
            Command::Follow {
                handle: "bob".to_string()
            }
        );
        assert_eq!(
            parse_command("like 7").unwrap(),
            Command::Like { tweet: TweetId(7) }
        );
        assert_eq!(
            parse_command("followers").unwrap(),
            Command::Followers { handle: None }
        );
        assert_eq!(parse_command("q").unwrap(), Command::Quit);
    }

    #[test]
    fn post_keeps_the_whole_line() {
        assert_eq!(
            parse_command("post hello   there world").unwrap(),
            Command::Post {
                content: "hello   there world".to_string()
            }
        );
        assert_eq!(
            parse_command("  p\tline one\n  line two  ").unwrap(),
            Command::Post {
                content: "line one\n  line two".to_string()
            }
        );
        assert!(parse_command("post").is_err());
        assert!(parse_command("post    ").is_err());
    }

    #[test]
    fn rejects_bad_arguments() {
        assert!(parse_command("like").is_err());
        assert!(parse_command("unlike seven").is_err());
        assert!(parse_command("follow").is_err());
        assert!(parse_command("home lots").is_err());
        assert!(parse_command("retweet 3").is_err());
    }

    #[test]
    fn home_defaults_limit() {
        assert_eq!(
            parse_command("home").unwrap(),
            Command::Home { limit: HOME_LIMIT }
        );
        assert_eq!(parse_command("home 5").unwrap(), Command::Home { limit: 5 });
    }

    #[test]
    fn execute_runs_as_the_shell_user() {
        let storage = Storage::open_memory().unwrap();
        storage.add_user("alice").unwrap();
        storage.add_user("bob").unwrap();
        let session =
            Session::sign_in(&storage, Some("alice"), Some(crate::storage::TEST_PASSWORD)).unwrap();
        let caller = session.caller().unwrap().clone();

        let repl = ReplSession {
            storage,
            handle: caller.handle.clone(),
            session: Session::Authenticated(caller),
            format: OutputFormat::Json,
            history_path: PathBuf::from("/dev/null"),
        };
        assert!(repl.execute("follow bob").unwrap());
        assert!(repl.execute("whoami").unwrap());
        assert!(!repl.execute("quit").unwrap());

        let bob = crate::store::UserDirectory::resolve(&repl.storage, "bob").unwrap();
        assert_eq!(
            crate::store::EdgeStore::follow_counts(&repl.storage, bob)
                .unwrap()
                .followers,
            1
        );
    }
}
