//! `SQLite` storage for users, tweets, follows and likes.
//!
//! One [`Storage`] wraps one connection. Requests that may run in parallel
//! each open their own `Storage` on the same file; the edge tables' UNIQUE
//! constraints, not anything in this process, keep edges from duplicating.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, ErrorCode, OptionalExtension, ToSql, ffi, params};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::doctor::{CheckCategory, CheckStatus, HealthCheck, TableStat};
use crate::error::{ChirpError, Result};
use crate::logging::OperationGuard;
use crate::model::{
    FollowCounts, FollowEdge, NetworkStats, PeerEdge, Tweet, TweetId, TweetView, User, UserId,
};
use crate::password::HashCost;
use crate::store::{EdgeInsert, EdgeStore, PostStore, UserDirectory};
use crate::validate::{self, SignupForm};

const SCHEMA_VERSION: i32 = 1;

/// Default wait on a locked database before a statement fails with `SQLITE_BUSY`.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(5_000);

const TABLES: [&str; 4] = ["users", "tweets", "follows", "likes"];

fn epoch_utc() -> DateTime<Utc> {
    DateTime::<Utc>::default()
}

/// Fixed-width RFC 3339 so that text order equals time order.
fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value).map_or_else(|_| epoch_utc(), |dt| dt.with_timezone(&Utc))
}

fn parse_timestamp_opt(value: Option<String>) -> Option<DateTime<Utc>> {
    value
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// `LIMIT -1` is "no limit" in `SQLite`.
fn limit_to_i64(limit: Option<usize>) -> i64 {
    limit.map_or(-1, |n| i64::try_from(n).unwrap_or(i64::MAX))
}

/// Which table constraint rejected a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Violation {
    Unique,
    Check,
    ForeignKey,
}

fn violation(err: &rusqlite::Error) -> Option<Violation> {
    match err {
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation => {
            match e.extended_code {
                ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                    Some(Violation::Unique)
                }
                ffi::SQLITE_CONSTRAINT_CHECK => Some(Violation::Check),
                ffi::SQLITE_CONSTRAINT_FOREIGNKEY => Some(Violation::ForeignKey),
                _ => None,
            }
        }
        _ => None,
    }
}

fn is_busy(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if matches!(e.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
    )
}

fn user_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        handle: row.get(1)?,
        email: row.get(2)?,
        created_at: parse_timestamp(&row.get::<_, String>(3)?),
    })
}

fn tweet_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Tweet> {
    Ok(Tweet {
        id: row.get(0)?,
        author_id: row.get(1)?,
        content: row.get(2)?,
        created_at: parse_timestamp(&row.get::<_, String>(3)?),
    })
}

fn peer_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PeerEdge> {
    Ok(PeerEdge {
        peer_id: row.get(0)?,
        handle: row.get(1)?,
        created_at: parse_timestamp(&row.get::<_, String>(2)?),
    })
}

const TWEET_VIEW_SELECT: &str = r"
    SELECT t.id, t.author_id, t.content, t.created_at, u.handle,
           (SELECT COUNT(*) FROM likes l WHERE l.tweet_id = t.id) AS liked_count,
           EXISTS(SELECT 1 FROM likes l WHERE l.tweet_id = t.id AND l.user_id = ?1) AS is_liked
    FROM tweets t
    JOIN users u ON u.id = t.author_id
";

fn tweet_view_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TweetView> {
    Ok(TweetView {
        tweet: tweet_from_row(row)?,
        author_handle: row.get(4)?,
        liked_count: row.get(5)?,
        is_liked: row.get(6)?,
    })
}

/// `SQLite` storage manager
pub struct Storage {
    conn: Connection,
    hash_cost: HashCost,
}

impl Storage {
    /// Open or create the database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_timeout(db_path, DEFAULT_BUSY_TIMEOUT)
    }

    /// Open or create the database, waiting up to `busy_timeout` on locks.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated, and
    /// `DatabaseLocked` if another writer held it past the timeout.
    pub fn open_with_timeout(db_path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Self> {
        let path = db_path.as_ref().to_path_buf();
        let conn = Connection::open(&path)?;
        conn.busy_timeout(busy_timeout)?;

        let locked = |e: rusqlite::Error| {
            if is_busy(&e) {
                ChirpError::DatabaseLocked { path: path.clone() }
            } else {
                e.into()
            }
        };

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
            ",
        )
        .map_err(locked)?;

        let storage = Self {
            conn,
            hash_cost: HashCost::default(),
        };
        storage.migrate().map_err(|e| match e {
            ChirpError::DatabaseError(inner) => locked(inner),
            other => other,
        })?;
        debug!(path = %path.display(), "Opened database");
        Ok(storage)
    }

    /// Open an in-memory database (for testing). Password hashes use the
    /// cheapest Argon2 parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be initialized.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
            ",
        )?;
        let storage = Self {
            conn,
            hash_cost: HashCost::minimal()?,
        };
        storage.migrate()?;
        Ok(storage)
    }

    /// Underlying connection, for ad-hoc queries.
    #[must_use]
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }

    fn migrate(&self) -> Result<()> {
        let current_version = self.get_schema_version();

        if current_version > SCHEMA_VERSION {
            return Err(ChirpError::SchemaMismatch {
                expected: SCHEMA_VERSION,
                found: current_version,
            });
        }

        if current_version < SCHEMA_VERSION {
            let guard = OperationGuard::new(format!(
                "migrate schema {current_version} -> {SCHEMA_VERSION}"
            ));
            match self.create_schema() {
                Ok(()) => guard.complete(),
                Err(e) => {
                    guard.fail(&e);
                    return Err(e);
                }
            }
        }

        Ok(())
    }

    fn get_schema_version(&self) -> i32 {
        let result: rusqlite::Result<i32> = self.conn.query_row(
            "SELECT value FROM meta WHERE key = 'schema_version'",
            [],
            |row| {
                let value: String = row.get(0)?;
                Ok(value.parse().unwrap_or(0))
            },
        );

        // Missing meta table means a fresh file.
        result.unwrap_or_default()
    }

    fn create_schema(&self) -> Result<()> {
        // One transaction so that concurrent first opens cannot interleave.
        let created = self.conn.execute_batch(&format!(
            r"
            BEGIN IMMEDIATE;

            CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY,
                handle TEXT NOT NULL UNIQUE,
                email TEXT NOT NULL,
                password_hash TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS tweets (
                id INTEGER PRIMARY KEY,
                author_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                content TEXT NOT NULL CHECK (length(content) BETWEEN 1 AND {max}),
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_tweets_author ON tweets(author_id, created_at);
            CREATE INDEX IF NOT EXISTS idx_tweets_created_at ON tweets(created_at);

            CREATE TABLE IF NOT EXISTS follows (
                id INTEGER PRIMARY KEY,
                follower_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                following_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                created_at TEXT NOT NULL,
                UNIQUE (follower_id, following_id),
                CHECK (follower_id <> following_id)
            );
            CREATE INDEX IF NOT EXISTS idx_follows_following ON follows(following_id);

            CREATE TABLE IF NOT EXISTS likes (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                tweet_id INTEGER NOT NULL REFERENCES tweets(id) ON DELETE CASCADE,
                created_at TEXT NOT NULL,
                UNIQUE (user_id, tweet_id)
            );
            CREATE INDEX IF NOT EXISTS idx_likes_tweet ON likes(tweet_id);

            INSERT OR REPLACE INTO meta (key, value) VALUES ('schema_version', '{version}');

            COMMIT;
            ",
            max = validate::TWEET_MAX_CHARS,
            version = SCHEMA_VERSION,
        ));
        if let Err(e) = created {
            if !self.conn.is_autocommit() {
                self.conn.execute_batch("ROLLBACK").ok();
            }
            return Err(e.into());
        }
        Ok(())
    }

    // =========================================================================
    // Users
    // =========================================================================

    /// Register a user from a sign-up form. Only the Argon2 hash of the
    /// password is stored.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for a field that fails its rule and
    /// `AlreadyExists` if the handle is taken.
    pub fn create_user(&self, form: &SignupForm<'_>) -> Result<User> {
        let validate::NewUser {
            handle,
            email,
            password,
        } = form.validate()?;
        let password_hash = self.hash_cost.hash(&password)?;
        let created_at = Utc::now();

        let inserted = self.conn.execute(
            "INSERT INTO users (handle, email, password_hash, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![handle, email, password_hash, format_timestamp(&created_at)],
        );
        match inserted {
            Ok(_) => {}
            Err(e) if violation(&e) == Some(Violation::Unique) => {
                return Err(ChirpError::already_exists(format!(
                    "handle '{handle}' is already taken"
                )));
            }
            Err(e) => return Err(e.into()),
        }

        let id = UserId(self.conn.last_insert_rowid());
        info!(user = %id, handle = %handle, "Created user");
        Ok(User {
            id,
            handle,
            email,
            created_at,
        })
    }

    /// Delete a user; tweets, follow edges on either side and likes cascade.
    ///
    /// Returns false if the user did not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn delete_user(&self, user: UserId) -> Result<bool> {
        let guard = OperationGuard::new(format!("delete user {user}"));
        match self
            .conn
            .execute("DELETE FROM users WHERE id = ?1", params![user])
        {
            Ok(removed) => {
                guard.complete();
                if removed > 0 {
                    info!(user = %user, "Deleted user and cascaded edges");
                }
                Ok(removed > 0)
            }
            Err(e) => {
                guard.fail(&e);
                Err(e.into())
            }
        }
    }

    /// Look up a user by handle (normalized the same way as at sign-up).
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_user_by_handle(&self, handle: &str) -> Result<Option<User>> {
        let handle = validate::canonical_handle(handle);
        Ok(self
            .conn
            .query_row(
                "SELECT id, handle, email, created_at FROM users WHERE handle = ?1",
                params![handle],
                user_from_row,
            )
            .optional()?)
    }

    /// All handles, alphabetically.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn all_handles(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT handle FROM users ORDER BY handle")?;
        let handles = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(handles)
    }

    // =========================================================================
    // Tweets
    // =========================================================================

    /// Post a tweet. Content is trimmed and must be 1..=200 characters.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for bad content and `NotFound` if the author
    /// does not exist.
    pub fn create_tweet(&self, author: UserId, content: &str) -> Result<Tweet> {
        let content = validate::validate_content(content)?;
        let created_at = Utc::now();

        let inserted = self.conn.execute(
            "INSERT INTO tweets (author_id, content, created_at) VALUES (?1, ?2, ?3)",
            params![author, content, format_timestamp(&created_at)],
        );
        match inserted {
            Ok(_) => {}
            Err(e) if violation(&e) == Some(Violation::ForeignKey) => {
                return Err(ChirpError::not_found("user", author));
            }
            Err(e) => return Err(e.into()),
        }

        let id = TweetId(self.conn.last_insert_rowid());
        info!(tweet = %id, author = %author, "Created tweet");
        Ok(Tweet {
            id,
            author_id: author,
            content,
            created_at,
        })
    }

    /// One tweet with author handle, like count and `viewer`'s like flag.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn tweet_view(&self, tweet: TweetId, viewer: Option<UserId>) -> Result<Option<TweetView>> {
        let sql = format!("{TWEET_VIEW_SELECT} WHERE t.id = ?2");
        Ok(self
            .conn
            .query_row(&sql, params![viewer, tweet], tweet_view_from_row)
            .optional()?)
    }

    /// Tweets newest first, optionally restricted to one author.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn tweet_views(
        &self,
        viewer: Option<UserId>,
        author: Option<UserId>,
        limit: Option<usize>,
    ) -> Result<Vec<TweetView>> {
        let sql = format!(
            "{TWEET_VIEW_SELECT}
             WHERE (?2 IS NULL OR t.author_id = ?2)
             ORDER BY t.created_at DESC, t.id DESC
             LIMIT ?3"
        );
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let views = stmt
            .query_map(
                params![viewer, author, limit_to_i64(limit)],
                tweet_view_from_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(views)
    }

    fn tweet_author_opt(&self, tweet: TweetId) -> Result<Option<UserId>> {
        Ok(self
            .conn
            .query_row(
                "SELECT author_id FROM tweets WHERE id = ?1",
                params![tweet],
                |row| row.get(0),
            )
            .optional()?)
    }

    // =========================================================================
    // Edges
    // =========================================================================

    /// Insert-if-absent on an edge table.
    ///
    /// The UNIQUE constraint decides whether the edge already existed, so two
    /// racing inserts can never both report `Inserted`. A busy database is
    /// retried once before reporting `Conflict`.
    fn insert_edge(
        &self,
        sql: &str,
        params: &[&dyn ToSql],
        on_check: impl Fn() -> ChirpError,
        on_missing: impl Fn() -> Result<ChirpError>,
    ) -> Result<EdgeInsert> {
        let mut retried = false;
        loop {
            let err = match self.conn.execute(sql, params) {
                Ok(_) => return Ok(EdgeInsert::Inserted),
                Err(err) => err,
            };
            match violation(&err) {
                Some(Violation::Unique) => return Ok(EdgeInsert::AlreadyPresent),
                Some(Violation::Check) => return Err(on_check()),
                Some(Violation::ForeignKey) => return Err(on_missing()?),
                None if is_busy(&err) && !retried => {
                    warn!(error = %err, "Edge insert hit a locked database, retrying once");
                    retried = true;
                }
                None if is_busy(&err) => {
                    return Err(ChirpError::conflict(format!(
                        "edge write did not get the database lock: {err}"
                    )));
                }
                None => return Err(err.into()),
            }
        }
    }

    fn user_exists(&self, user: UserId) -> Result<bool> {
        Ok(self
            .conn
            .query_row("SELECT 1 FROM users WHERE id = ?1", params![user], |_| Ok(()))
            .optional()?
            .is_some())
    }

    /// `NotFound` for whichever side of a rejected edge insert is gone,
    /// checking the caller first.
    fn missing_endpoint(
        &self,
        caller: UserId,
        target_type: &'static str,
        target: impl ToString,
    ) -> Result<ChirpError> {
        if self.user_exists(caller)? {
            Ok(ChirpError::not_found(target_type, target))
        } else {
            Ok(ChirpError::not_found("user", caller))
        }
    }

    fn count(&self, sql: &str, params: &[&dyn ToSql]) -> Result<i64> {
        Ok(self.conn.query_row(sql, params, |row| row.get(0))?)
    }

    // =========================================================================
    // Statistics and diagnostics
    // =========================================================================

    /// Row counts and tweet date bounds in a single query.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn stats(&self) -> Result<NetworkStats> {
        let query = r"
            SELECT
                (SELECT COUNT(*) FROM users) AS users_count,
                (SELECT COUNT(*) FROM tweets) AS tweets_count,
                (SELECT COUNT(*) FROM follows) AS follows_count,
                (SELECT COUNT(*) FROM likes) AS likes_count,
                (SELECT MIN(created_at) FROM tweets) AS first_tweet_date,
                (SELECT MAX(created_at) FROM tweets) AS last_tweet_date
        ";

        Ok(self.conn.query_row(query, [], |row| {
            Ok(NetworkStats {
                users_count: row.get(0)?,
                tweets_count: row.get(1)?,
                follows_count: row.get(2)?,
                likes_count: row.get(3)?,
                first_tweet_date: parse_timestamp_opt(row.get(4)?),
                last_tweet_date: parse_timestamp_opt(row.get(5)?),
            })
        })?)
    }

    /// Run database health checks for `chirp doctor`.
    #[must_use]
    pub fn database_health_checks(&self) -> Vec<HealthCheck> {
        vec![
            self.check_integrity(),
            self.check_schema_version(),
            self.check_foreign_keys(),
            self.check_count(
                CheckCategory::Graph,
                "Self-follow edges",
                "SELECT COUNT(*) FROM follows WHERE follower_id = following_id",
                "Delete rows in follows where follower_id = following_id.",
            ),
            self.check_count(
                CheckCategory::Graph,
                "Orphaned follow edges",
                "SELECT COUNT(*) FROM follows f
                 WHERE NOT EXISTS (SELECT 1 FROM users u WHERE u.id = f.follower_id)
                    OR NOT EXISTS (SELECT 1 FROM users u WHERE u.id = f.following_id)",
                "Foreign keys were disabled while users were deleted; remove the orphaned rows.",
            ),
            self.check_count(
                CheckCategory::Engagement,
                "Orphaned like edges",
                "SELECT COUNT(*) FROM likes l
                 WHERE NOT EXISTS (SELECT 1 FROM tweets t WHERE t.id = l.tweet_id)
                    OR NOT EXISTS (SELECT 1 FROM users u WHERE u.id = l.user_id)",
                "Foreign keys were disabled while tweets were deleted; remove the orphaned rows.",
            ),
            self.check_table_stats(),
        ]
    }

    /// Row counts (and sizes where `dbstat` is compiled in) for each table.
    ///
    /// # Errors
    ///
    /// Returns an error if a count query fails.
    pub fn database_table_stats(&self) -> Result<Vec<TableStat>> {
        let dbstat = self.dbstat_available();
        TABLES
            .iter()
            .map(|table| {
                Ok(TableStat {
                    name: (*table).to_string(),
                    rows: self.count(&format!("SELECT COUNT(*) FROM {table}"), &[])?,
                    bytes: if dbstat {
                        self.table_size_bytes(table)
                    } else {
                        None
                    },
                })
            })
            .collect()
    }

    fn check_integrity(&self) -> HealthCheck {
        let name = "PRAGMA integrity_check";
        match self
            .conn
            .query_row("PRAGMA integrity_check", [], |row| row.get::<_, String>(0))
        {
            Ok(result) if result == "ok" => HealthCheck::pass(CheckCategory::Database, name, "ok"),
            Ok(result) => HealthCheck::failing(
                CheckCategory::Database,
                name,
                CheckStatus::Error,
                format!("Integrity check failed: {result}"),
                "Database corruption detected. Restore from backup.",
            ),
            Err(err) => HealthCheck::failing(
                CheckCategory::Database,
                name,
                CheckStatus::Error,
                format!("Integrity check failed: {err}"),
                "Database corruption detected. Restore from backup.",
            ),
        }
    }

    fn check_schema_version(&self) -> HealthCheck {
        let current = self.get_schema_version();
        if current == SCHEMA_VERSION {
            HealthCheck::pass(
                CheckCategory::Database,
                "Schema version",
                format!("schema_version={current}"),
            )
        } else {
            HealthCheck::failing(
                CheckCategory::Database,
                "Schema version",
                CheckStatus::Error,
                format!("schema_version={current}, expected={SCHEMA_VERSION}"),
                "Point --db at a database created by this version of chirp.",
            )
        }
    }

    fn check_foreign_keys(&self) -> HealthCheck {
        let name = "PRAGMA foreign_key_check";
        match self.foreign_key_violations() {
            Ok(0) => HealthCheck::pass(CheckCategory::Database, name, "0 violations"),
            Ok(n) => HealthCheck::failing(
                CheckCategory::Database,
                name,
                CheckStatus::Warning,
                format!("{n} violations"),
                "Rows reference deleted users or tweets; see the orphaned-edge checks.",
            ),
            Err(err) => HealthCheck::failing(
                CheckCategory::Database,
                name,
                CheckStatus::Error,
                format!("Query failed: {err}"),
                "Check that the file is a chirp database.",
            ),
        }
    }

    fn foreign_key_violations(&self) -> rusqlite::Result<usize> {
        let mut stmt = self.conn.prepare("PRAGMA foreign_key_check")?;
        let mut rows = stmt.query([])?;
        let mut count = 0;
        while rows.next()?.is_some() {
            count += 1;
        }
        Ok(count)
    }

    fn check_table_stats(&self) -> HealthCheck {
        match self.database_table_stats() {
            Ok(stats) => HealthCheck::pass(
                CheckCategory::Database,
                "Table stats",
                format_table_stats(&stats),
            ),
            Err(err) => HealthCheck::failing(
                CheckCategory::Database,
                "Table stats",
                CheckStatus::Error,
                format!("Failed to collect table stats: {err}"),
                "Check that the file is a chirp database.",
            ),
        }
    }

    fn check_count(
        &self,
        category: CheckCategory,
        name: &str,
        sql: &str,
        suggestion: &str,
    ) -> HealthCheck {
        match self.count(sql, &[]) {
            Ok(0) => HealthCheck::pass(category, name, "0 rows"),
            Ok(count) => HealthCheck::failing(
                category,
                name,
                CheckStatus::Warning,
                format!("{count} rows"),
                suggestion,
            ),
            Err(err) => HealthCheck::failing(
                category,
                name,
                CheckStatus::Error,
                format!("Query failed: {err}"),
                suggestion,
            ),
        }
    }

    fn dbstat_available(&self) -> bool {
        self.conn
            .query_row("SELECT COUNT(*) FROM dbstat LIMIT 1", [], |row| {
                row.get::<_, i64>(0)
            })
            .is_ok()
    }

    fn table_size_bytes(&self, table: &str) -> Option<i64> {
        self.conn
            .query_row(
                "SELECT SUM(pgsize) FROM dbstat WHERE name = ?1",
                [table],
                |row| row.get::<_, Option<i64>>(0),
            )
            .ok()
            .flatten()
    }
}

fn format_table_stats(stats: &[TableStat]) -> String {
    stats
        .iter()
        .map(|stat| match stat.bytes {
            Some(bytes) => format!(
                "{}={} ({})",
                stat.name,
                crate::format_number(stat.rows),
                crate::format_bytes_i64(bytes)
            ),
            None => format!("{}={}", stat.name, crate::format_number(stat.rows)),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

impl UserDirectory for Storage {
    fn resolve(&self, handle: &str) -> Result<UserId> {
        let canonical = validate::canonical_handle(handle);
        self.conn
            .query_row(
                "SELECT id FROM users WHERE handle = ?1",
                params![canonical],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| ChirpError::not_found("user", canonical))
    }

    fn handle_of(&self, user: UserId) -> Result<String> {
        self.conn
            .query_row(
                "SELECT handle FROM users WHERE id = ?1",
                params![user],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| ChirpError::not_found("user", user))
    }

    fn password_hash(&self, user: UserId) -> Result<String> {
        self.conn
            .query_row(
                "SELECT password_hash FROM users WHERE id = ?1",
                params![user],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| ChirpError::not_found("user", user))
    }
}

impl PostStore for Storage {
    fn tweet_exists(&self, tweet: TweetId) -> Result<bool> {
        Ok(self.tweet_author_opt(tweet)?.is_some())
    }

    fn tweet_author(&self, tweet: TweetId) -> Result<UserId> {
        self.tweet_author_opt(tweet)?
            .ok_or_else(|| ChirpError::not_found("tweet", tweet))
    }

    fn delete_tweet(&self, tweet: TweetId, caller: UserId) -> Result<()> {
        // Ownership is part of the WHERE clause, so the check and the delete
        // are one statement.
        let removed = self.conn.execute(
            "DELETE FROM tweets WHERE id = ?1 AND author_id = ?2",
            params![tweet, caller],
        )?;
        if removed > 0 {
            info!(tweet = %tweet, caller = %caller, "Deleted tweet");
            return Ok(());
        }

        match self.tweet_author_opt(tweet)? {
            None => Err(ChirpError::not_found("tweet", tweet)),
            Some(author) => {
                warn!(
                    tweet = %tweet,
                    caller = %caller,
                    author = %author,
                    "Refused tweet delete by non-author"
                );
                Err(ChirpError::forbidden(format!(
                    "tweet {tweet} belongs to another user"
                )))
            }
        }
    }
}

impl EdgeStore for Storage {
    fn insert_follow(
        &self,
        follower: UserId,
        following: UserId,
        at: DateTime<Utc>,
    ) -> Result<EdgeInsert> {
        let outcome = self.insert_edge(
            "INSERT INTO follows (follower_id, following_id, created_at) VALUES (?1, ?2, ?3)",
            params![follower, following, format_timestamp(&at)],
            || ChirpError::invalid_operation("cannot follow self"),
            || self.missing_endpoint(follower, "user", following),
        )?;
        debug!(follower = %follower, following = %following, ?outcome, "Follow insert");
        Ok(outcome)
    }

    fn delete_follow(&self, follower: UserId, following: UserId) -> Result<bool> {
        let removed = self.conn.execute(
            "DELETE FROM follows WHERE follower_id = ?1 AND following_id = ?2",
            params![follower, following],
        )?;
        Ok(removed > 0)
    }

    fn follow_edge(&self, follower: UserId, following: UserId) -> Result<Option<FollowEdge>> {
        Ok(self
            .conn
            .query_row(
                "SELECT follower_id, following_id, created_at FROM follows
                 WHERE follower_id = ?1 AND following_id = ?2",
                params![follower, following],
                |row| {
                    Ok(FollowEdge {
                        follower_id: row.get(0)?,
                        following_id: row.get(1)?,
                        created_at: parse_timestamp(&row.get::<_, String>(2)?),
                    })
                },
            )
            .optional()?)
    }

    fn follow_counts(&self, user: UserId) -> Result<FollowCounts> {
        Ok(self.conn.query_row(
            "SELECT
                (SELECT COUNT(*) FROM follows WHERE follower_id = ?1),
                (SELECT COUNT(*) FROM follows WHERE following_id = ?1)",
            params![user],
            |row| {
                Ok(FollowCounts {
                    following: row.get(0)?,
                    followers: row.get(1)?,
                })
            },
        )?)
    }

    fn list_following(&self, user: UserId, limit: Option<usize>) -> Result<Vec<PeerEdge>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT f.following_id, u.handle, f.created_at
             FROM follows f JOIN users u ON u.id = f.following_id
             WHERE f.follower_id = ?1
             ORDER BY f.created_at DESC, f.id DESC
             LIMIT ?2",
        )?;
        let peers = stmt
            .query_map(params![user, limit_to_i64(limit)], peer_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(peers)
    }

    fn list_followers(&self, user: UserId, limit: Option<usize>) -> Result<Vec<PeerEdge>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT f.follower_id, u.handle, f.created_at
             FROM follows f JOIN users u ON u.id = f.follower_id
             WHERE f.following_id = ?1
             ORDER BY f.created_at DESC, f.id DESC
             LIMIT ?2",
        )?;
        let peers = stmt
            .query_map(params![user, limit_to_i64(limit)], peer_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(peers)
    }

    fn insert_like(&self, user: UserId, tweet: TweetId, at: DateTime<Utc>) -> Result<EdgeInsert> {
        let outcome = self.insert_edge(
            "INSERT INTO likes (user_id, tweet_id, created_at) VALUES (?1, ?2, ?3)",
            params![user, tweet, format_timestamp(&at)],
            || ChirpError::invalid_operation("like rejected by table check"),
            || self.missing_endpoint(user, "tweet", tweet),
        )?;
        debug!(user = %user, tweet = %tweet, ?outcome, "Like insert");
        Ok(outcome)
    }

    fn delete_like(&self, user: UserId, tweet: TweetId) -> Result<bool> {
        let removed = self.conn.execute(
            "DELETE FROM likes WHERE user_id = ?1 AND tweet_id = ?2",
            params![user, tweet],
        )?;
        Ok(removed > 0)
    }

    fn like_count(&self, tweet: TweetId) -> Result<i64> {
        self.count(
            "SELECT COUNT(*) FROM likes WHERE tweet_id = ?1",
            params![tweet],
        )
    }

    fn liked_tweets(&self, user: UserId) -> Result<Vec<TweetId>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT tweet_id FROM likes WHERE user_id = ?1 ORDER BY created_at DESC, id DESC",
        )?;
        let ids = stmt
            .query_map(params![user], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<TweetId>>>()?;
        Ok(ids)
    }
}

/// Password given to every account made by [`Storage::add_user`].
#[cfg(test)]
pub(crate) const TEST_PASSWORD: &str = "QaZ105edc";

#[cfg(test)]
impl Storage {
    /// Sign up `handle` with `<handle>@example.com` and [`TEST_PASSWORD`].
    pub(crate) fn add_user(&self, handle: &str) -> Result<User> {
        let email = format!("{handle}@example.com");
        self.create_user(&SignupForm {
            handle,
            email: &email,
            password1: TEST_PASSWORD,
            password2: TEST_PASSWORD,
        })
    }
}
