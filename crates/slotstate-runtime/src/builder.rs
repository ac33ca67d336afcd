//! Store Builder API
//!
//! Composes a [`Store`] from a [`StoreConfig`], an event logger, a reducer
//! [`Resolver`] and a time source.

use crate::entry::StoreContext;
use crate::store::Store;
use slotstate_core::{
    CloneMode, LogLevel, LogManager, LoggerWrapper, NoOpLogger, Resolver, StoreConfig,
    StoreLogger, SystemTimeSource, TimeSource,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Builder for creating a store
pub struct StoreBuilder {
    config: StoreConfig,
    logger: LoggerWrapper,
    resolver: Resolver,
    clock: Arc<dyn TimeSource>,
}

impl StoreBuilder {
    pub fn new() -> Self {
        Self {
            config: StoreConfig::default(),
            logger: LoggerWrapper::default(),
            resolver: Resolver::new(),
            clock: Arc::new(SystemTimeSource),
        }
    }

    /// Set the store configuration
    pub fn with_config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_clone_mode(mut self, mode: CloneMode) -> Self {
        self.config.clone_mode = mode;
        self
    }

    /// Default delay of debounced reducer tasks
    pub fn debounce_delay(mut self, delay: Duration) -> Self {
        self.config.debounce_delay_ms = delay.as_millis() as u64;
        self
    }

    /// Log store events through `tracing` at `level`
    pub fn with_console_logging(mut self, level: LogLevel) -> Self {
        self.logger = LoggerWrapper::default();
        self.config.logging.enabled = true;
        self.config.logging.defaults.level = level;
        self
    }

    /// Route store events to a custom logger
    pub fn with_logger(mut self, logger: Arc<dyn StoreLogger>) -> Self {
        self.logger = LoggerWrapper::Custom(logger);
        self
    }

    /// Disable logging
    pub fn with_no_logging(mut self) -> Self {
        self.logger = LoggerWrapper::NoOp(NoOpLogger);
        self.config.logging.enabled = false;
        self
    }

    /// Resolver used by `dispatch`
    pub fn with_resolver(mut self, resolver: Resolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Clock used for storage expiry
    pub fn with_time_source(mut self, clock: Arc<dyn TimeSource>) -> Self {
        self.clock = clock;
        self
    }

    pub fn build(self) -> Store {
        info!(
            "Building slotstate store (clone mode {:?}, logging {})",
            self.config.clone_mode,
            if self.config.logging.enabled { "on" } else { "off" }
        );

        let logs = LogManager::new(self.logger);
        let logging = &self.config.logging;
        if !logging.kinds.is_empty() {
            logs.configure(&[], logging.kinds, logging.defaults.clone());
        }
        if logging.enabled {
            logs.turn_on();
        }

        Store::from_context(StoreContext {
            config: self.config,
            logs,
            resolver: self.resolver,
            clock: self.clock,
        })
    }
}

impl Default for StoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}
