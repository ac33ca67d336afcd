//! CLI configuration
//!
//! A TOML file holds the [`StoreConfig`] under `[store]` and the defaults of
//! the persistence scenario under `[storage]`. Missing sections fall back to
//! their defaults.

use crate::error::{CliError, Result};
use serde::{Deserialize, Serialize};
use slotstate_core::StoreConfig;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Complete configuration for the CLI
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub storage: StorageConfig,
}

/// Where the persistence scenario keeps its files
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub dir: PathBuf,
    pub ttl_secs: Option<u64>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: std::env::temp_dir().join("slotstate"),
            ttl_secs: None,
        }
    }
}

impl StorageConfig {
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl_secs.map(Duration::from_secs)
    }
}

impl AppConfig {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|err| {
            CliError::Config(format!("cannot read {}: {}", path.display(), err))
        })?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }
}
