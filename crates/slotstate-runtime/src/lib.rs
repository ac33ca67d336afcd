//! slotstate Runtime Engine
//!
//! This crate contains the coordination engine for slotstate, including:
//! - `Store`: the explicit registry of slots and entry point for every operation
//! - The per-slot task queue that serializes reducers and drains on tokio tasks
//! - Getter coordination, subscriber notification and suspend/resume
//! - Storage bindings and debounced reducer tasks
//!
//! `slotstate-core` provides the stable API definitions; this crate is the
//! engine behind them.

mod entry;
mod suspend;

pub mod builder;
pub mod debounce;
pub mod getters;
pub mod persistence;
pub mod queue;
pub mod registry;
pub mod store;
pub mod subscribers;

pub use builder::StoreBuilder;
pub use debounce::DebouncedReducer;
pub use getters::StateGetter;
pub use persistence::StorageBinding;
pub use queue::ReduceHandle;
pub use registry::SlotInfo;
pub use store::Store;
pub use subscribers::Subscription;

// Re-export core types for convenience
pub use slotstate_core::{
    delegate, CloneMode, ConsoleLogger, DisposalScope, EventKind, EventKinds, FileStorage,
    KeyValueStore, LogConfig, LogLevel, LogManager, LoggerWrapper, ManualTimeSource,
    MemoryStorage, NoOpLogger, Reducer, ReducerDelegate, Resolver, SetState, SlotId, SlotKey,
    Snapshot, State, StoreConfig, StoreError, StoreEvent, StoreLogger, StoreResult,
    StoredEnvelope, SystemTimeSource, TimeSource,
};
