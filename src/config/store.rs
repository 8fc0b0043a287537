use serde::Deserialize;
use std::path::PathBuf;

use super::ConfigError;
use crate::store::DEFAULT_BATCH_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Which key-value backend to open (default: sqlite)
    pub backend: StoreBackend,

    /// SQLite database file; falls back to the platform data directory
    pub path: Option<PathBuf>,

    /// Largest key set sent in one batch lookup (default: 100)
    pub batch_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Sqlite,
            path: None,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl StoreConfig {
    pub fn database_path(&self) -> Result<PathBuf, ConfigError> {
        if let Some(path) = &self.path {
            return Ok(path.clone());
        }
        let data_dir = dirs::data_dir().ok_or(ConfigError::NoDataDir)?;
        let conduit_dir = data_dir.join("conduit");
        std::fs::create_dir_all(&conduit_dir).map_err(|e| ConfigError::Io {
            path: conduit_dir.clone(),
            source: e,
        })?;
        Ok(conduit_dir.join("conduit.db"))
    }
}
