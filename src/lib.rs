//! chirp - follow and like relationships for a small microblog
//!
//! The library keeps the invariants of the two kinds of edges in a
//! Twitter-like network: who follows whom, and who liked which tweet.
//!
//! # Modules
//!
//! - [`graph`] - Follow / unfollow and follower listings
//! - [`engagement`] - Like / unlike
//! - [`guard`] - Authentication and ownership guards
//! - [`password`] - Argon2id password hashes
//! - [`validate`] - Sign-up and tweet form rules
//! - [`handlers`] - Request handlers returning status + JSON replies
//! - [`storage`] - `SQLite` storage layer
//! - [`store`] - Traits the managers are written against
//! - [`error`] - Error taxonomy and status codes

pub mod cli;
pub mod config;
pub mod doctor;
pub mod engagement;
pub mod error;
pub mod graph;
pub mod guard;
pub mod handlers;
pub mod logging;
pub mod model;
pub mod password;
pub mod profile;
pub mod render;
pub mod repl;
pub mod storage;
pub mod store;
pub mod validate;

pub use cli::*;
pub use engagement::Engagement;
pub use error::{ChirpError, Result, find_closest_match, format_did_you_mean, format_error};
pub use graph::SocialGraph;
pub use guard::{Caller, Session};
pub use handlers::Reply;
pub use model::*;
pub use storage::Storage;
pub use store::{EdgeInsert, EdgeStore, PostStore, UserDirectory};
pub use validate::SignupForm;

use chrono::{DateTime, Datelike, Utc};

/// Default database filename
pub const DEFAULT_DB_NAME: &str = "chirp.db";

/// Width of the rule printed between tweets in text output
pub const CONTENT_DIVIDER_WIDTH: usize = 60;

const BYTES_PER_KB: u64 = 1024;
const BYTES_PER_MB: u64 = 1024 * 1024;
const BYTES_PER_GB: u64 = 1024 * 1024 * 1024;

/// Get the default data directory for chirp
#[must_use]
pub fn default_data_dir() -> std::path::PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("chirp")
}

/// Get the default database path
#[must_use]
pub fn default_db_path() -> std::path::PathBuf {
    default_data_dir().join(DEFAULT_DB_NAME)
}

/// Format an integer with thousands separators.
#[must_use]
pub fn format_number(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0 {
        out.push('-');
    }
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Format a datetime relative to now ("just now", "5m ago", "Mar 02").
#[must_use]
pub fn format_relative_date(dt: DateTime<Utc>) -> String {
    format_relative_date_with_base(dt, Utc::now())
}

/// Format a datetime relative to a fixed base time.
#[must_use]
pub fn format_relative_date_with_base(dt: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now.signed_duration_since(dt);
    if elapsed.num_seconds() < 0 {
        return dt.format("%b %d, %Y").to_string();
    }

    match (elapsed.num_minutes(), elapsed.num_hours(), elapsed.num_days()) {
        (0, _, _) => "just now".to_string(),
        (m, 0, _) => format!("{m}m ago"),
        (_, h, 0) => format!("{h}h ago"),
        (_, _, d) if d < 7 => format!("{d}d ago"),
        _ if dt.year() == now.year() => dt.format("%b %d").to_string(),
        _ => dt.format("%b %d, %Y").to_string(),
    }
}

/// Format an optional datetime, "never" when absent.
#[must_use]
pub fn format_optional_date(value: Option<DateTime<Utc>>) -> String {
    value.map_or_else(|| "never".to_string(), format_relative_date)
}

/// Shorten `text` to at most `max_chars` characters, ending in "..." when cut.
#[must_use]
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    let single_line = text.replace(['\n', '\r'], " ");
    if single_line.chars().count() <= max_chars {
        return single_line;
    }
    let kept: String = single_line.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{kept}...")
}

/// Format bytes into a human-friendly string.
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    let (unit, suffix) = if bytes < BYTES_PER_KB {
        return format!("{bytes} B");
    } else if bytes < BYTES_PER_MB {
        (BYTES_PER_KB, "KB")
    } else if bytes < BYTES_PER_GB {
        (BYTES_PER_MB, "MB")
    } else {
        (BYTES_PER_GB, "GB")
    };
    let whole = bytes / unit;
    let tenths = (bytes % unit) * 10 / unit;
    format!("{whole}.{tenths} {suffix}")
}

/// Format bytes for signed input, clamping negatives to zero.
#[must_use]
pub fn format_bytes_i64(bytes: i64) -> String {
    format_bytes(u64::try_from(bytes).unwrap_or(0))
}
