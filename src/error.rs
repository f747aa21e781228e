//! Custom error types for chirp.
//!
//! Every operation of the social graph and engagement managers returns a
//! typed [`ChirpError`] so the request layer can map it onto a status code
//! without inspecting message text.

use std::path::PathBuf;
use thiserror::Error;

/// Primary error type for chirp operations.
///
/// Each variant carries enough context to render a useful message and to
/// decide the response status programmatically.
#[derive(Error, Debug)]
pub enum ChirpError {
    // =========================================================================
    // Relationship Errors
    // =========================================================================
    /// Referenced user or tweet does not exist.
    #[error("{item_type} '{id}' not found")]
    NotFound { item_type: &'static str, id: String },

    /// Request is well-formed but not allowed for these endpoints (self-follow).
    #[error("Invalid operation: {reason}")]
    InvalidOperation { reason: String },

    /// The edge or row being created already exists and the operation reports it.
    #[error("{reason}")]
    AlreadyExists { reason: String },

    /// Caller lacks rights over an existing row.
    #[error("Forbidden: {reason}")]
    Forbidden { reason: String },

    /// Lost a write race against a concurrent request.
    #[error("Conflicting concurrent update: {reason}")]
    Conflict { reason: String },

    /// Operation needs an authenticated caller, or the credentials given
    /// did not match an account.
    #[error("Authentication required. Pass --as <handle> and --password.")]
    Unauthenticated,

    // =========================================================================
    // Validation Errors
    // =========================================================================
    /// A form field failed the validation schema.
    #[error("Invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    // =========================================================================
    // Database Errors
    // =========================================================================
    /// Database schema version mismatch.
    #[error("Database schema version mismatch: expected {expected}, found {found}.")]
    SchemaMismatch { expected: i32, found: i32 },

    /// Database is locked by another process for longer than the busy timeout.
    #[error(
        "Database is locked. Ensure no other chirp process holds a write transaction.\n\
         If the problem persists, remove the lock files:\n  rm {path}-wal {path}-shm"
    )]
    DatabaseLocked { path: PathBuf },

    /// Database operation failed.
    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    // =========================================================================
    // IO Errors
    // =========================================================================
    /// Path-specific IO error with context.
    #[error("Failed to {operation} '{path}': {source}")]
    PathError {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Configuration file parsing error.
    #[error("Invalid configuration in '{path}': {reason}")]
    ConfigError { path: PathBuf, reason: String },

    // =========================================================================
    // Generic Errors
    // =========================================================================
    /// Catch-all for other errors with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Result type alias for chirp operations.
pub type Result<T> = std::result::Result<T, ChirpError>;

impl ChirpError {
    /// Create a not found error.
    pub fn not_found(item_type: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            item_type,
            id: id.to_string(),
        }
    }

    /// Create an invalid operation error.
    pub fn invalid_operation(reason: impl Into<String>) -> Self {
        Self::InvalidOperation {
            reason: reason.into(),
        }
    }

    /// Create an already-exists error.
    pub fn already_exists(reason: impl Into<String>) -> Self {
        Self::AlreadyExists {
            reason: reason.into(),
        }
    }

    /// Create a forbidden error.
    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::Forbidden {
            reason: reason.into(),
        }
    }

    /// Create a conflict error.
    pub fn conflict(reason: impl Into<String>) -> Self {
        Self::Conflict {
            reason: reason.into(),
        }
    }

    /// Create a validation error for a form field.
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }

    /// Create a path error with context.
    pub fn path_error(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Self::PathError {
            operation,
            path: path.into(),
            source,
        }
    }

    /// Wrap an error with additional context.
    pub fn with_context<E>(context: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::WithContext {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// HTTP-style status code for this error.
    ///
    /// A repeated follow answers 400 like any other rejected form post;
    /// only a lost write race answers 409.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::InvalidOperation { .. }
            | Self::AlreadyExists { .. }
            | Self::Validation { .. } => 400,
            Self::Unauthenticated => 401,
            Self::Forbidden { .. } => 403,
            Self::Conflict { .. } => 409,
            _ => 500,
        }
    }

    /// Get a suggestion for how to fix this error, if applicable.
    #[must_use]
    pub const fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::Unauthenticated => {
                Some("Run 'chirp signup <handle> --email <email>' first, then sign in with it.")
            }
            Self::Conflict { .. } => {
                Some("Another request changed the same edge; retry the command.")
            }
            Self::SchemaMismatch { .. } => {
                Some("Remove the database file or point --db at a fresh location.")
            }
            Self::DatabaseLocked { .. } => {
                Some("Close other chirp instances or raise store.busy_timeout_ms.")
            }
            _ => None,
        }
    }
}

// =============================================================================
// CLI Error Formatting Utilities
// =============================================================================

use colored::Colorize;

/// Format a structured CLI error with explanation and suggestions.
#[must_use]
pub fn format_error(title: &str, explanation: &str, suggestions: &[&str]) -> String {
    use std::fmt::Write;

    let mut output = format!("{} {}", "✗".red().bold(), title.bold());

    if !explanation.is_empty() {
        let _ = write!(output, "\n\n   {explanation}");
    }

    if !suggestions.is_empty() {
        output.push_str("\n\n   ");
        if suggestions.len() == 1 {
            let _ = write!(output, "{} {}", "Hint:".cyan(), suggestions[0]);
        } else {
            let _ = write!(output, "{}:", "Try".cyan());
            for suggestion in suggestions {
                let _ = write!(output, "\n     {} {}", "•".dimmed(), suggestion);
            }
        }
    }

    output
}

/// Calculate the Levenshtein edit distance between two strings.
#[must_use]
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let a_len = a_chars.len();
    let b_len = b_chars.len();

    if a_len == 0 {
        return b_len;
    }
    if b_len == 0 {
        return a_len;
    }

    let mut prev_row: Vec<usize> = (0..=b_len).collect();
    let mut curr_row: Vec<usize> = vec![0; b_len + 1];

    for (i, a_char) in a_chars.iter().enumerate() {
        curr_row[0] = i + 1;

        for (j, b_char) in b_chars.iter().enumerate() {
            let cost = usize::from(a_char != b_char);
            curr_row[j + 1] = (prev_row[j + 1] + 1)
                .min(curr_row[j] + 1)
                .min(prev_row[j] + cost);
        }

        std::mem::swap(&mut prev_row, &mut curr_row);
    }

    prev_row[b_len]
}

/// Find the closest known handle for a mistyped one.
///
/// Exact matches are not returned: if the input matched, there would be
/// nothing to suggest.
#[must_use]
pub fn find_closest_match<'a>(
    input: &str,
    candidates: &'a [String],
    max_distance: Option<usize>,
) -> Option<&'a str> {
    let max_dist = max_distance.unwrap_or(2);
    let input_lower = input.to_lowercase();

    candidates
        .iter()
        .map(|candidate| {
            let distance = levenshtein_distance(&input_lower, &candidate.to_lowercase());
            (candidate.as_str(), distance)
        })
        .filter(|(_, distance)| *distance <= max_dist && *distance > 0)
        .min_by_key(|(_, distance)| *distance)
        .map(|(candidate, _)| candidate)
}

/// Format a "did you mean?" suggestion.
#[must_use]
pub fn format_did_you_mean(suggestion: &str) -> String {
    format!("Did you mean '{}'?", suggestion.green())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ChirpError::not_found("user", "bob");
        assert_eq!(err.to_string(), "user 'bob' not found");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(ChirpError::not_found("tweet", 9).status_code(), 404);
        assert_eq!(
            ChirpError::invalid_operation("cannot follow self").status_code(),
            400
        );
        assert_eq!(ChirpError::already_exists("already following").status_code(), 400);
        assert_eq!(ChirpError::Unauthenticated.status_code(), 401);
        assert_eq!(ChirpError::forbidden("not the author").status_code(), 403);
        assert_eq!(ChirpError::conflict("lost race").status_code(), 409);
        assert_eq!(
            ChirpError::DatabaseError(rusqlite::Error::InvalidQuery).status_code(),
            500
        );
    }

    #[test]
    fn test_error_suggestions() {
        let err = ChirpError::Unauthenticated;
        assert!(err.suggestion().is_some());
        assert!(err.to_string().contains("--password"));
        assert!(
            ChirpError::DatabaseError(rusqlite::Error::InvalidQuery)
                .suggestion()
                .is_none()
        );
    }

    #[test]
    fn test_path_error_names_the_file() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = ChirpError::path_error("read", "/etc/chirp.toml", io_err);
        assert_eq!(
            err.to_string(),
            "Failed to read '/etc/chirp.toml': file not found"
        );
        assert_eq!(err.status_code(), 500);
    }

    #[test]
    fn test_database_locked_message() {
        let err = ChirpError::DatabaseLocked {
            path: PathBuf::from("/tmp/chirp.db"),
        };
        assert_eq!(
            err.to_string(),
            "Database is locked. Ensure no other chirp process holds a write transaction.\n\
             If the problem persists, remove the lock files:\n  \
             rm /tmp/chirp.db-wal /tmp/chirp.db-shm"
        );
        assert!(err.suggestion().is_some());
        assert_eq!(
            ChirpError::Unauthenticated.suggestion(),
            Some("Run 'chirp signup <handle> --email <email>' first, then sign in with it.")
        );
    }

    #[test]
    fn test_with_context_keeps_source() {
        let err = ChirpError::with_context(
            "Failed to write config",
            std::io::Error::other("disk gone"),
        );
        assert_eq!(err.to_string(), "Failed to write config: disk gone");
        assert_eq!(err.status_code(), 500);
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn levenshtein_basics() {
        assert_eq!(levenshtein_distance("hello", "hello"), 0);
        assert_eq!(levenshtein_distance("cat", "cats"), 1);
        assert_eq!(levenshtein_distance("", "bob"), 3);
    }

    #[test]
    fn find_closest_match_typo() {
        let handles = vec!["alice".to_string(), "bob".to_string(), "carol".to_string()];
        assert_eq!(find_closest_match("alcie", &handles, None), Some("alice"));
        assert_eq!(find_closest_match("BOB", &handles, None), None);
        assert_eq!(find_closest_match("zzzzzz", &handles, None), None);
    }

    #[test]
    fn format_error_multiple_suggestions() {
        let output = format_error(
            "Unknown user",
            "No account is registered under that handle",
            &["First option", "Second option"],
        );
        assert!(output.contains("Unknown user"));
        assert!(output.contains("First option"));
        assert!(output.contains("Second option"));
    }
}
