//! chirp - a tiny microblog CLI
//!
//! Main entry point for the chirp command-line tool. Each subcommand opens
//! its own connection, runs one handler and prints the reply.

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, ValueEnum};
use clap_complete::generate;
use colored::Colorize;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::debug;

use chirp::config::Config;
use chirp::doctor::{CheckStatus, DoctorReport};
use chirp::logging::init_cli_logging;
use chirp::render::{self, View};
use chirp::{
    CONTENT_DIVIDER_WIDTH, ChirpError, Cli, Commands, OutputFormat, Reply, Session, SignupForm,
    Storage, cli, find_closest_match, format_error, handlers, repl,
};

/// Effective settings for one invocation: config file, env, then flags.
struct Invocation {
    config: Config,
    db_path: PathBuf,
    user: Option<String>,
    /// Only ever from the flag or `CHIRP_PASSWORD`, never the config file.
    password: Option<String>,
    format: OutputFormat,
}

impl Invocation {
    fn new(cli: &Cli, config: Config) -> Self {
        let db_path = cli.db.clone().unwrap_or_else(|| config.db_path());
        let user = cli.as_user.clone().or_else(|| config.session.user.clone());
        let format = cli.format.unwrap_or_else(|| {
            OutputFormat::from_str(&config.output.format, true).unwrap_or_default()
        });
        Self {
            config,
            db_path,
            user,
            password: cli.password.clone(),
            format,
        }
    }

    fn open_storage(&self) -> Result<Storage> {
        if let Some(parent) = self.db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let storage = Storage::open_with_timeout(&self.db_path, self.config.busy_timeout())?;
        debug!(db = %self.db_path.display(), "Storage ready");
        Ok(storage)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = Config::load();

    let quiet = cli.quiet || config.output.quiet;
    init_cli_logging(&config.log, quiet, cli.verbose);
    if !config.output.colors {
        colored::control::set_override(false);
    }

    let ctx = Invocation::new(&cli, config);
    match run(&cli, &ctx) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", format_error(&e.to_string(), "", &[]));
            ExitCode::from(2)
        }
    }
}

fn run(cli: &Cli, ctx: &Invocation) -> Result<ExitCode> {
    match &cli.command {
        Commands::Config(args) => return cmd_config(ctx, args),
        Commands::Completions(args) => return Ok(cmd_completions(args.clone())),
        _ => {}
    }

    let storage = ctx.open_storage()?;

    let session = if needs_session(&cli.command) {
        match Session::sign_in(&storage, ctx.user.as_deref(), ctx.password.as_deref()) {
            Ok(session) => session,
            Err(e) => {
                return Ok(fail(ctx, &storage, &Reply::from_error(&e), ctx.user.as_deref()));
            }
        }
    } else {
        Session::Anonymous
    };

    dispatch(ctx, &storage, &session, &cli.command)
}

/// Commands that run as the `--as` user. The rest never look at it, so a
/// stale `CHIRP_USER` cannot break `signup` or `doctor`.
const fn needs_session(command: &Commands) -> bool {
    !matches!(
        command,
        Commands::Signup(_)
            | Commands::Stats
            | Commands::Doctor
            | Commands::Config(_)
            | Commands::Completions(_)
    )
}

fn dispatch(
    ctx: &Invocation,
    storage: &Storage,
    session: &Session,
    command: &Commands,
) -> Result<ExitCode> {
    let (view, reply, looked_up) = match command {
        Commands::Signup(args) => {
            let password = ctx.password.as_deref().unwrap_or_default();
            let form = SignupForm {
                handle: &args.handle,
                email: &args.email,
                password1: password,
                password2: args.confirm_password.as_deref().unwrap_or(password),
            };
            (View::Signup, handlers::signup(storage, &form), None)
        }
        Commands::DeleteAccount => (
            View::AccountDeleted,
            handlers::delete_account(storage, session),
            None,
        ),
        Commands::Post(args) => (
            View::Posted,
            handlers::post(storage, session, &args.content),
            None,
        ),
        Commands::Delete(args) => (
            View::TweetDeleted,
            handlers::delete_tweet(storage, session, args.id),
            None,
        ),
        Commands::Tweet(args) => (
            View::TweetDetail,
            handlers::tweet_detail(storage, session, args.id),
            None,
        ),
        Commands::Follow(args) => (
            View::Follow,
            handlers::follow(storage, session, &args.handle),
            Some(args.handle.as_str()),
        ),
        Commands::Unfollow(args) => (
            View::Unfollow,
            handlers::unfollow(storage, session, &args.handle),
            Some(args.handle.as_str()),
        ),
        Commands::Following(args) => (
            View::Following,
            handlers::following(storage, session, &args.handle, args.limit),
            Some(args.handle.as_str()),
        ),
        Commands::Followers(args) => (
            View::Followers,
            handlers::followers(storage, session, &args.handle, args.limit),
            Some(args.handle.as_str()),
        ),
        Commands::Like(args) => (View::Like, handlers::like(storage, session, args.id), None),
        Commands::Unlike(args) => (
            View::Unlike,
            handlers::unlike(storage, session, args.id),
            None,
        ),
        Commands::Profile(args) => (
            View::Profile,
            handlers::profile(storage, session, &args.handle, args.limit),
            Some(args.handle.as_str()),
        ),
        Commands::Home(args) => (
            View::Home,
            handlers::home(storage, session, Some(args.limit)),
            None,
        ),
        Commands::Stats => (View::Stats, handlers::stats(storage), None),
        Commands::Doctor => return cmd_doctor(ctx, storage),
        Commands::Shell => return cmd_shell(ctx, storage, session),
        Commands::Config(args) => return cmd_config(ctx, args),
        Commands::Completions(args) => return Ok(cmd_completions(args.clone())),
    };

    if reply.is_success() {
        render::print_success(view, &reply, ctx.format)?;
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(fail(ctx, storage, &reply, looked_up))
    }
}

/// Print a failed reply and turn its status into the exit code.
fn fail(ctx: &Invocation, storage: &Storage, reply: &Reply, looked_up: Option<&str>) -> ExitCode {
    let suggestion = match reply.status {
        401 | 404 => looked_up.and_then(|handle| closest_handle(storage, handle)),
        _ => None,
    };
    render::print_failure(reply, ctx.format, suggestion.as_deref());
    exit_code_for(reply.status)
}

/// 4xx is the caller's problem (1), anything else is ours (2).
fn exit_code_for(status: u16) -> ExitCode {
    if (400..500).contains(&status) {
        ExitCode::from(1)
    } else {
        ExitCode::from(2)
    }
}

fn closest_handle(storage: &Storage, handle: &str) -> Option<String> {
    let handles = storage.all_handles().ok()?;
    find_closest_match(handle.trim_start_matches('@'), &handles, None).map(str::to_string)
}

fn cmd_shell(ctx: &Invocation, storage: &Storage, session: &Session) -> Result<ExitCode> {
    let Some(caller) = session.caller().cloned() else {
        let reply = Reply::from_error(&ChirpError::Unauthenticated);
        return Ok(fail(ctx, storage, &reply, None));
    };
    // The shell keeps its own connection for its whole lifetime.
    let shell_storage = ctx.open_storage()?;
    repl::run(shell_storage, caller, ctx.format)?;
    Ok(ExitCode::SUCCESS)
}

fn cmd_doctor(ctx: &Invocation, storage: &Storage) -> Result<ExitCode> {
    let report = DoctorReport::from_checks(storage.database_health_checks());

    match ctx.format {
        OutputFormat::Json => println!("{}", serde_json::to_string(&report)?),
        OutputFormat::JsonPretty => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => {
            println!("{}", "chirp doctor".bold().cyan());
            println!("  Database: {}", ctx.db_path.display());
            println!("{}", "─".repeat(CONTENT_DIVIDER_WIDTH));
            for check in &report.checks {
                let mark = match check.status {
                    CheckStatus::Pass => "✓".green(),
                    CheckStatus::Warning => "!".yellow(),
                    CheckStatus::Error => "✗".red(),
                };
                println!("  {mark} {:<28} {}", check.name, check.message.dimmed());
                if let Some(suggestion) = &check.suggestion {
                    println!("      {}", suggestion.cyan());
                }
            }
            println!("{}", "─".repeat(CONTENT_DIVIDER_WIDTH));
            println!(
                "  {} passed, {} warnings, {} errors",
                report.passed.to_string().green(),
                report.warnings.to_string().yellow(),
                report.errors.to_string().red()
            );
        }
    }

    Ok(if report.is_healthy() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

fn cmd_config(ctx: &Invocation, args: &cli::ConfigArgs) -> Result<ExitCode> {
    if args.init {
        return init_config(Config::user_config_path().as_deref());
    }

    match ctx.format {
        OutputFormat::Json => println!("{}", serde_json::to_string(&ctx.config)?),
        OutputFormat::JsonPretty => println!("{}", serde_json::to_string_pretty(&ctx.config)?),
        OutputFormat::Text => {
            println!("{}", "Current Configuration".bold().cyan());
            if let Some(path) = Config::user_config_path() {
                let state = if path.exists() { "" } else { " (not created)" };
                println!("  Config file: {}{state}", path.display());
            }
            println!("  Database:    {}", ctx.db_path.display());
            println!(
                "  Signed in:   {}",
                ctx.user.as_deref().map_or_else(|| "-".to_string(), |u| format!("@{u}"))
            );
            println!();
            print!(
                "{}",
                toml::to_string_pretty(&ctx.config).context("Failed to render config")?
            );
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn init_config(path: Option<&Path>) -> Result<ExitCode> {
    let path = path.context("Could not determine the config directory")?;
    if path.exists() {
        println!(
            "{}",
            format!("Config already exists at {}", path.display()).yellow()
        );
        return Ok(ExitCode::SUCCESS);
    }
    Config::default().save_to(path)?;
    println!("{} Wrote {}", "✓".green(), path.display());
    Ok(ExitCode::SUCCESS)
}

fn cmd_completions(args: cli::CompletionsArgs) -> ExitCode {
    let mut cmd = Cli::command();
    generate(args.shell, &mut cmd, "chirp", &mut io::stdout());
    ExitCode::SUCCESS
}
