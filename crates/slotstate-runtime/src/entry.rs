//! Per-slot coordination state
//!
//! Every slot owns one [`StateEntry`] behind a `std::sync::Mutex`. The lock is
//! only ever held for bookkeeping and is never held across an `.await`; the
//! `is_busy` flag, claimed under the lock, is what serializes reducers.

use instant::Instant;
use slotstate_core::{
    LogManager, ReducerDelegate, Resolver, SlotId, Snapshot, State, StoreConfig, StoreResult,
    TimeSource,
};
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

// ----------------------------------------------------------------------------
// Store Context
// ----------------------------------------------------------------------------

/// Collaborators shared by every slot of one store
pub(crate) struct StoreContext {
    pub config: StoreConfig,
    pub logs: LogManager,
    pub resolver: Resolver,
    pub clock: Arc<dyn TimeSource>,
}

impl StoreContext {
    pub fn deliver<T: State>(&self, value: &Snapshot<T>) -> Snapshot<T> {
        self.config.clone_mode.deliver(value)
    }
}

// ----------------------------------------------------------------------------
// Queued Work
// ----------------------------------------------------------------------------

/// A submitted mutation waiting for the drain
pub(crate) struct ReducerTask<T> {
    /// Position in the slot's submission order, starting at 1
    pub seq: u64,
    pub transform: ReducerDelegate<T>,
    /// Debug rendering of the submitted arguments, kept only while logging
    pub args: Option<String>,
    pub reply: oneshot::Sender<StoreResult<()>>,
}

/// A read waiting for the queue to settle
pub(crate) struct GetterRequest<T> {
    pub reply: oneshot::Sender<Option<Snapshot<T>>>,
    /// Sequence number of the last reducer enqueued before the request
    pub barrier: u64,
    pub requested_at: Instant,
}

impl<T> GetterRequest<T> {
    pub fn new(reply: oneshot::Sender<Option<Snapshot<T>>>, barrier: u64) -> Self {
        Self {
            reply,
            barrier,
            requested_at: Instant::now(),
        }
    }
}

/// A live observer
pub(crate) struct Subscriber<T> {
    pub id: Uuid,
    pub sender: mpsc::UnboundedSender<Snapshot<T>>,
    /// Registered while work was queued; owed the value settled by this
    /// submission, the same one a getter issued then would see
    pub initial_barrier: Option<u64>,
}

/// Persists a freshly committed value
pub(crate) type Saver<T> = Arc<dyn Fn(&StoreContext, &SlotId, &T) + Send + Sync>;

// ----------------------------------------------------------------------------
// State Entry
// ----------------------------------------------------------------------------

pub(crate) struct StateEntry<T> {
    pub value: Option<Snapshot<T>>,
    pub is_busy: bool,
    pub is_initiated: bool,
    pub is_suspended: bool,
    /// Reducers ever enqueued on this slot
    pub enqueued: u64,
    /// Sequence number of the last reducer whose transform settled
    pub settled: u64,
    pub pending_reducers: VecDeque<ReducerTask<T>>,
    pub pending_getters: VecDeque<GetterRequest<T>>,
    pub suspended_getters: VecDeque<GetterRequest<T>>,
    pub subscribers: Vec<Subscriber<T>>,
    pub saver: Option<Saver<T>>,
}

impl<T> StateEntry<T> {
    /// Take the drain claim if the slot is idle and has queued reducers
    pub fn try_claim(&mut self) -> bool {
        if self.is_busy || self.pending_reducers.is_empty() {
            return false;
        }
        self.is_busy = true;
        true
    }

    /// Every submission so far has committed or failed
    pub fn is_settled(&self) -> bool {
        self.settled >= self.enqueued
    }
}

impl<T> Default for StateEntry<T> {
    fn default() -> Self {
        Self {
            value: None,
            is_busy: false,
            is_initiated: false,
            is_suspended: false,
            enqueued: 0,
            settled: 0,
            pending_reducers: VecDeque::new(),
            pending_getters: VecDeque::new(),
            suspended_getters: VecDeque::new(),
            subscribers: Vec::new(),
            saver: None,
        }
    }
}

// ----------------------------------------------------------------------------
// Slot
// ----------------------------------------------------------------------------

/// One slot of a store: identity, shared context and guarded entry
pub(crate) struct Slot<T> {
    pub id: SlotId,
    pub ctx: Arc<StoreContext>,
    entry: Mutex<StateEntry<T>>,
}

impl<T: State> Slot<T> {
    pub fn new(id: SlotId, ctx: Arc<StoreContext>) -> Self {
        Self {
            id,
            ctx,
            entry: Mutex::new(StateEntry::default()),
        }
    }

    /// Lock the entry. A panic never happens while the lock is held by the
    /// engine, so poisoning is recovered rather than propagated.
    pub fn lock(&self) -> MutexGuard<'_, StateEntry<T>> {
        self.entry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> fmt::Debug for Slot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot")
            .field("id", &self.id)
            .field("state", &std::any::type_name::<T>())
            .finish()
    }
}
