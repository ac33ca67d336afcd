//! Error types for slotstate
//!
//! Transform failures travel only to the submitter of the failing reducer.
//! Configuration errors are returned synchronously at the call site.

use crate::slot::SlotId;

/// Main error type for store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Reducer for slot `{slot}` failed: {source}")]
    ReducerFailed {
        slot: SlotId,
        #[source]
        source: anyhow::Error,
    },

    #[error("Reducer for slot `{slot}` panicked")]
    ReducerPanicked { slot: SlotId },

    #[error("No reducer registered for type {type_name}")]
    ReducerNotRegistered { type_name: &'static str },

    #[error("Slot `{slot}` holds {found}, not {expected}")]
    SlotTypeMismatch {
        slot: SlotId,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Disposal scope has already been disposed")]
    ScopeDisposed,

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Scheduled reducer was superseded by a newer execution")]
    Superseded,

    #[error("Store was dropped before the reducer for slot `{slot}` settled")]
    Dropped { slot: SlotId },
}

impl StoreError {
    pub fn storage_error(message: impl Into<String>) -> Self {
        StoreError::Storage(message.into())
    }

    pub fn config_error(message: impl Into<String>) -> Self {
        StoreError::Configuration(message.into())
    }

    /// True for the errors that come from a reducer's own transform
    pub fn is_transform_failure(&self) -> bool {
        matches!(
            self,
            StoreError::ReducerFailed { .. } | StoreError::ReducerPanicked { .. }
        )
    }
}

/// Result type for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;
