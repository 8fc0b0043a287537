//! Configuration management for Conduit.
//!
//! Configuration is read from `~/.config/conduit/config.toml` at startup.
//! If the file doesn't exist, a default configuration with comments is created.

pub mod feed;
pub mod pagination;
pub mod store;

pub use feed::{FeedConfig, UnfollowPolicy};
pub use pagination::PaginationConfig;
pub use store::{StoreBackend, StoreConfig};

use serde::Deserialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Main configuration struct.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub pagination: PaginationConfig,
    pub feed: FeedConfig,
}

impl Config {
    /// Load configuration from the default path.
    ///
    /// If the config file doesn't exist, creates a default one with comments.
    /// If the config file exists but is invalid, returns an error.
    /// Missing fields in the config file will use default values.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::default_config_path()?;

        if !config_path.exists() {
            Self::create_default_config(&config_path)?;
            return Ok(Self::default());
        }

        Self::from_path(&config_path)
    }

    /// Load configuration from an explicit file.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config = Self::from_toml_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Rejects settings the services cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let p = &self.pagination;
        if p.min_limit == 0 || p.min_limit > p.max_limit {
            return Err(ConfigError::Invalid(format!(
                "pagination limits must satisfy 1 <= min_limit <= max_limit, got {}..{}",
                p.min_limit, p.max_limit
            )));
        }
        if p.default_limit < p.min_limit || p.default_limit > p.max_limit {
            return Err(ConfigError::Invalid(format!(
                "default_limit {} is outside {}..={}",
                p.default_limit, p.min_limit, p.max_limit
            )));
        }
        if self.store.batch_size == 0 {
            return Err(ConfigError::Invalid("store.batch_size must be positive".into()));
        }
        if self.feed.fanout_concurrency == 0 || self.feed.queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "feed.fanout_concurrency and feed.queue_capacity must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Get the default config file path: `~/.config/conduit/config.toml`
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("conduit").join("config.toml"))
    }

    /// Create a default config file with comments.
    fn create_default_config(path: &PathBuf) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut file = fs::File::create(path).map_err(|e| ConfigError::Io {
            path: path.clone(),
            source: e,
        })?;

        file.write_all(Self::default_config_content().as_bytes())
            .map_err(|e| ConfigError::Io {
                path: path.clone(),
                source: e,
            })?;

        Ok(())
    }

    /// Generate the default config file content with comments.
    fn default_config_content() -> String {
        r##"# Conduit Configuration

[store]
# "memory" keeps everything in process; "sqlite" persists to `path`
backend = "sqlite"

# Database file (default: <data dir>/conduit/conduit.db)
# path = "/var/lib/conduit/conduit.db"

# Maximum number of keys per batch lookup
batch_size = 100

[pagination]
default_limit = 10
min_limit = 1
max_limit = 20

# Seals page tokens so clients cannot forge resume positions.
# Change this in production.
token_secret = "conduit-development-secret"

[feed]
# Concurrent feed-entry writes per fan-out
fanout_concurrency = 10

# Pending feed events before publishers wait
queue_capacity = 1024

# What happens to materialized feed entries after an unfollow:
# - "filter_on_read": kept, hidden when the feed is read (default)
# - "retain": kept and shown
# - "purge": removed in the background
unfollow_policy = "filter_on_read"
"##
        .to_string()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Could not determine data directory")]
    NoDataDir,

    #[error("Failed to read/write config file at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
