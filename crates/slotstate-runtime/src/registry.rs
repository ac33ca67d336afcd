//! Slot registry
//!
//! Maps slot identities to their typed slots. Entries are created lazily on
//! first access and never replaced, so every caller of one identity shares
//! one queue.

use crate::entry::{Slot, StoreContext};
use dashmap::DashMap;
use serde::Serialize;
use slotstate_core::{SlotId, SlotKey, State, StoreError, StoreResult};
use std::any::{type_name, Any};
use std::sync::Arc;
use tracing::debug;

/// Diagnostic snapshot of one slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotInfo {
    pub id: SlotId,
    pub value_type: &'static str,
    pub has_value: bool,
    pub is_busy: bool,
    pub is_initiated: bool,
    pub is_suspended: bool,
    pub pending_reducers: usize,
    pub pending_getters: usize,
    pub suspended_getters: usize,
    pub subscribers: usize,
}

/// Type-erased view of a slot held by the registry
pub(crate) trait SlotHandle: Send + Sync {
    fn info(&self) -> SlotInfo;

    fn value_type(&self) -> &'static str;

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: State> SlotHandle for Slot<T> {
    fn info(&self) -> SlotInfo {
        let entry = self.lock();
        SlotInfo {
            id: self.id.clone(),
            value_type: type_name::<T>(),
            has_value: entry.value.is_some(),
            is_busy: entry.is_busy,
            is_initiated: entry.is_initiated,
            is_suspended: entry.is_suspended,
            pending_reducers: entry.pending_reducers.len(),
            pending_getters: entry.pending_getters.len(),
            suspended_getters: entry.suspended_getters.len(),
            subscribers: entry.subscribers.len(),
        }
    }

    fn value_type(&self) -> &'static str {
        type_name::<T>()
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

#[derive(Default)]
pub(crate) struct SlotRegistry {
    slots: DashMap<SlotId, Arc<dyn SlotHandle>>,
}

impl SlotRegistry {
    /// Get or create the slot for `key`
    pub fn slot<T: State>(
        &self,
        key: &SlotKey<T>,
        ctx: &Arc<StoreContext>,
    ) -> StoreResult<Arc<Slot<T>>> {
        let handle = self
            .slots
            .entry(key.id().clone())
            .or_insert_with(|| {
                debug!("Creating slot `{}` for {}", key.id(), type_name::<T>());
                Arc::new(Slot::<T>::new(key.id().clone(), Arc::clone(ctx))) as Arc<dyn SlotHandle>
            })
            .value()
            .clone();

        let found = handle.value_type();
        handle
            .into_any()
            .downcast::<Slot<T>>()
            .map_err(|_| StoreError::SlotTypeMismatch {
                slot: key.id().clone(),
                expected: type_name::<T>(),
                found,
            })
    }

    /// Diagnostics for every known slot, ordered by id
    pub fn infos(&self) -> Vec<SlotInfo> {
        // Collect first so no shard lock is held while slot locks are taken
        let handles: Vec<Arc<dyn SlotHandle>> = self
            .slots
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        let mut infos: Vec<SlotInfo> = handles.iter().map(|handle| handle.info()).collect();
        infos.sort_by(|a, b| a.id.cmp(&b.id));
        infos
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }
}
