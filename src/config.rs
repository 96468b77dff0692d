//! Configuration file parser for ~/.config/verse/config.toml.
//!
//! The config file is optional: a missing file yields `Config::default()`.
//! Unknown keys are ignored by serde, but logged as a warning since they are
//! most likely typos.
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::feed::fetcher::{FetchSettings, MAX_FEED_SIZE};
use crate::storage::{DEFAULT_REFRESH_INTERVAL_SECS, MAX_REFRESH_INTERVAL_SECS};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    /// Parsed fine, but a value is out of range.
    #[error("Invalid config value: {0}")]
    Invalid(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// A user-added syndication feed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FeedEntry {
    pub name: String,
    pub url: String,
}

/// Top-level configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite file. `None` means `verse.db` next to the config file.
    pub database_path: Option<PathBuf>,

    /// Minutes between scheduler sweeps.
    pub sweep_interval_minutes: u64,

    /// Refresh interval given to newly created sources.
    pub default_refresh_interval_secs: u64,

    /// TCP connect plus TLS handshake bound.
    pub connect_timeout_secs: u64,

    /// Bound on waiting for response headers.
    pub header_timeout_secs: u64,

    /// Overall request bound, body included.
    pub request_timeout_secs: u64,

    /// Response body cap in bytes.
    pub max_feed_bytes: usize,

    /// Register the built-in subreddits, Hacker News and Lobsters.
    pub include_default_sources: bool,

    /// Extra subreddits to follow.
    pub subreddits: Vec<String>,

    /// Extra generic feeds.
    pub feeds: Vec<FeedEntry>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: None,
            sweep_interval_minutes: 60,
            default_refresh_interval_secs: DEFAULT_REFRESH_INTERVAL_SECS as u64,
            connect_timeout_secs: 10,
            header_timeout_secs: 10,
            request_timeout_secs: 30,
            max_feed_bytes: MAX_FEED_SIZE,
            include_default_sources: true,
            subreddits: Vec::new(),
            feeds: Vec::new(),
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 10] = [
        "database_path",
        "sweep_interval_minutes",
        "default_refresh_interval_secs",
        "connect_timeout_secs",
        "header_timeout_secs",
        "request_timeout_secs",
        "max_feed_bytes",
        "include_default_sources",
        "subreddits",
        "feeds",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Out-of-range values → `Err(ConfigError::Invalid)`
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // Check file size before reading
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        tracing::info!(
            path = %path.display(),
            sweep_interval_minutes = config.sweep_interval_minutes,
            extra_feeds = config.feeds.len(),
            extra_subreddits = config.subreddits.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sweep_interval_minutes == 0 {
            return Err(ConfigError::Invalid(
                "sweep_interval_minutes must be at least 1".to_string(),
            ));
        }
        for (key, secs) in [
            ("connect_timeout_secs", self.connect_timeout_secs),
            ("header_timeout_secs", self.header_timeout_secs),
            ("request_timeout_secs", self.request_timeout_secs),
        ] {
            if secs == 0 {
                return Err(ConfigError::Invalid(format!("{} must be at least 1", key)));
            }
        }
        if self.default_refresh_interval_secs > MAX_REFRESH_INTERVAL_SECS as u64 {
            return Err(ConfigError::Invalid(format!(
                "default_refresh_interval_secs must be at most {} (one year)",
                MAX_REFRESH_INTERVAL_SECS
            )));
        }
        if self.max_feed_bytes == 0 {
            return Err(ConfigError::Invalid(
                "max_feed_bytes must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_minutes.saturating_mul(60))
    }

    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            header_timeout: Duration::from_secs(self.header_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            max_bytes: self.max_feed_bytes,
        }
    }

    /// Database location: `database_path` if set, else `verse.db` in `config_dir`.
    pub fn database_path_in(&self, config_dir: &Path) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| config_dir.join("verse.db"))
    }
}

// ============================================================================
// Tests
// ============================================================================
