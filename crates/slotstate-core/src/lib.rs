//! slotstate Core
//!
//! Stable API definitions for the slotstate engine:
//! - Slot identity (`SlotId`, `SlotKey`) and the `State` bound
//! - The `Reducer` trait and ad-hoc reducer delegates
//! - The `StoreError` taxonomy
//! - Configuration (`StoreConfig`, `CloneMode`, logging settings)
//! - Instrumentation (`StoreEvent`, `StoreLogger`, `LogManager`)
//! - Persistence (`KeyValueStore`, `MemoryStorage`, `FileStorage`)
//! - Collaborator capabilities (`Resolver`, `DisposalScope`, `TimeSource`)
//!
//! The coordination engine itself lives in `slotstate-runtime`; this crate
//! only carries the types both the engine and its consumers share.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod config;
pub mod disposal;
pub mod errors;
pub mod logging;
pub mod reducer;
pub mod resolver;
pub mod slot;
pub mod storage;
pub mod time;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use config::{CloneMode, LoggingConfig, StoreConfig};
pub use disposal::DisposalScope;
pub use errors::{StoreError, StoreResult};
pub use logging::{
    ConsoleLogger, EventKind, EventKinds, LogConfig, LogLevel, LogManager, LoggerWrapper,
    NoOpLogger, StoreEvent, StoreLogger,
};
pub use reducer::{delegate, DelegateFuture, Reducer, ReducerDelegate, SetState};
pub use resolver::Resolver;
pub use slot::{SlotId, SlotKey, Snapshot, State};
pub use storage::{FileStorage, KeyValueStore, MemoryStorage, StoredEnvelope};
pub use time::{ManualTimeSource, SystemTimeSource, TimeSource};
