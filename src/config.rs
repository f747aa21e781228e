//! Configuration system for chirp.
//!
//! Provides layered configuration from multiple sources:
//!
//! 1. **Compiled defaults**
//! 2. **User config file** - `~/.config/chirp/config.toml`
//! 3. **Environment variables** - `CHIRP_*` prefix
//! 4. **CLI arguments** - Highest priority, always wins
//!
//! # Example Configuration File
//!
//! ```toml
//! [paths]
//! db = "~/.local/share/chirp/chirp.db"
//!
//! [session]
//! user = "alice"
//!
//! [store]
//! busy_timeout_ms = 5000
//!
//! [output]
//! format = "text"
//! colors = true
//!
//! [log]
//! level = "warn"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{ChirpError, Result};

/// Main configuration structure for chirp.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub session: SessionConfig,
    pub store: StoreConfig,
    pub output: OutputConfig,
    pub log: LogSettings,
}

/// Database location.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Path to the `SQLite` database file.
    /// Environment variable: `CHIRP_DB`
    pub db: Option<PathBuf>,
}

/// Who the caller is when `--as` is not given.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Handle of the signed-in user.
    /// Environment variable: `CHIRP_USER`
    pub user: Option<String>,
}

/// Store tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// How long a connection waits on a locked database before giving up.
    /// Environment variable: `CHIRP_BUSY_TIMEOUT_MS`
    pub busy_timeout_ms: u64,
}

/// Output formatting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Default output format: text, json, json-pretty.
    pub format: String,
    /// Enable colored output.
    pub colors: bool,
    /// Suppress non-essential output.
    pub quiet: bool,
}

/// `[log]` section, turned into a [`crate::logging::LogConfig`] at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub level: String,
    pub format: String,
    pub timestamps: bool,
    pub colors: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            busy_timeout_ms: 5_000,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: "text".to_string(),
            colors: true,
            quiet: false,
        }
    }
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: "compact".to_string(),
            timestamps: false,
            colors: true,
        }
    }
}

impl Config {
    /// Load configuration from defaults, the user file and the environment.
    pub fn load() -> Self {
        let mut config = Self::default();

        if let Some(user_config) = Self::user_config_path().and_then(|p| Self::load_from_file(&p))
        {
            config.merge(user_config);
        }

        config.apply_env_overrides();

        debug!("Configuration loaded: {:?}", config);
        config
    }

    /// Load configuration from a specific file. Missing or broken files yield `None`.
    pub fn load_from_file(path: &Path) -> Option<Self> {
        if !path.exists() {
            debug!("Config file not found: {}", path.display());
            return None;
        }

        match Self::parse_file(path) {
            Ok(config) => {
                info!("Loaded config from: {}", path.display());
                Some(config)
            }
            Err(e) => {
                warn!("{e}");
                None
            }
        }
    }

    /// Read and parse a config file, reporting why it failed.
    ///
    /// # Errors
    ///
    /// Returns `PathError` if the file cannot be read and `ConfigError` if it
    /// is not valid TOML for this schema.
    pub fn parse_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ChirpError::path_error("read", path, e))?;
        toml::from_str(&content).map_err(|e| ChirpError::ConfigError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Get the path to the user configuration file.
    #[must_use]
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("chirp").join("config.toml"))
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply `CHIRP_*` overrides read through `lookup`.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(db) = lookup("CHIRP_DB") {
            self.paths.db = Some(PathBuf::from(db));
        }
        if let Some(user) = lookup("CHIRP_USER").filter(|u| !u.trim().is_empty()) {
            self.session.user = Some(user);
        }
        if let Some(timeout) = lookup("CHIRP_BUSY_TIMEOUT_MS") {
            match timeout.parse() {
                Ok(ms) => self.store.busy_timeout_ms = ms,
                Err(_) => warn!("Ignoring invalid CHIRP_BUSY_TIMEOUT_MS={timeout}"),
            }
        }
        if let Some(format) = lookup("CHIRP_FORMAT") {
            self.output.format = format;
        }
        if lookup("CHIRP_NO_COLOR").is_some() || lookup("NO_COLOR").is_some() {
            self.output.colors = false;
            self.log.colors = false;
        }
        if lookup("CHIRP_QUIET").is_some() {
            self.output.quiet = true;
        }
    }

    /// Merge another config into this one (other takes precedence).
    fn merge(&mut self, other: Self) {
        if other.paths.db.is_some() {
            self.paths.db = other.paths.db;
        }
        if other.session.user.is_some() {
            self.session.user = other.session.user;
        }
        self.store = other.store;
        self.output = other.output;
        self.log = other.log;
    }

    /// Database path, falling back to the platform data directory.
    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.paths
            .db
            .clone()
            .unwrap_or_else(crate::default_db_path)
    }

    #[must_use]
    pub const fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.store.busy_timeout_ms)
    }

    /// Write this configuration as TOML to `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns `PathError` if a directory or the file cannot be written.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| ChirpError::path_error("create", parent, e))?;
        }

        let content = toml::to_string_pretty(self).map_err(|e| ChirpError::ConfigError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        std::fs::write(path, content).map_err(|e| ChirpError::path_error("write", path, e))?;
        info!("Saved config to: {}", path.display());
        Ok(())
    }
}
