//! Centralized Configuration Management
//!
//! Configuration structures for a slotstate store. Every struct is
//! serde-derived with `#[serde(default)]` so partial TOML files load.

use crate::logging::{EventKinds, LogConfig};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

// ----------------------------------------------------------------------------
// Clone Policy
// ----------------------------------------------------------------------------

/// How committed values are handed to getters and subscribers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloneMode {
    /// Every delivery is a fresh `Arc` over a clone of the committed value
    #[default]
    Structural,
    /// The committed `Arc` itself is delivered
    Shared,
}

impl CloneMode {
    pub fn deliver<T: Clone>(&self, value: &Arc<T>) -> Arc<T> {
        match self {
            CloneMode::Structural => Arc::new(T::clone(value)),
            CloneMode::Shared => Arc::clone(value),
        }
    }
}

// ----------------------------------------------------------------------------
// Logging Configuration
// ----------------------------------------------------------------------------

/// Initial state of the store's log manager
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Emit store events at all
    pub enabled: bool,
    /// Event kinds the default config is installed for
    pub kinds: EventKinds,
    /// Global config applied to `kinds`
    pub defaults: LogConfig,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            kinds: EventKinds::ALL,
            defaults: LogConfig::default(),
        }
    }
}

// ----------------------------------------------------------------------------
// Store Configuration
// ----------------------------------------------------------------------------

/// Store configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub clone_mode: CloneMode,
    /// Delay used by debounced reducer tasks when none is given
    pub debounce_delay_ms: u64,
    pub logging: LoggingConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            clone_mode: CloneMode::Structural,
            debounce_delay_ms: 300, // matches typical input debounce
            logging: LoggingConfig::default(),
        }
    }
}

impl StoreConfig {
    /// Verbose configuration for tests
    pub fn testing() -> Self {
        Self {
            clone_mode: CloneMode::Structural,
            debounce_delay_ms: 10, // keep paused-clock tests short
            logging: LoggingConfig {
                enabled: true,
                kinds: EventKinds::ALL,
                defaults: LogConfig::verbose(),
            },
        }
    }

    /// Shared snapshots and no instrumentation
    pub fn performance() -> Self {
        Self {
            clone_mode: CloneMode::Shared,
            debounce_delay_ms: 300,
            logging: LoggingConfig {
                enabled: false,
                kinds: EventKinds::NONE,
                defaults: LogConfig::default(),
            },
        }
    }

    pub fn debounce_delay(&self) -> Duration {
        Duration::from_millis(self.debounce_delay_ms)
    }
}
