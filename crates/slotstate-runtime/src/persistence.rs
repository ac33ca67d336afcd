//! Storage binding
//!
//! Ties a slot to a [`KeyValueStore`] entry: the stored value seeds the slot
//! when the binding is installed and every successful commit is written back.
//! Storage failures are logged and never reach the reducer queue.

use crate::entry::{Saver, Slot, StoreContext};
use crate::queue::ReduceHandle;
use serde::de::DeserializeOwned;
use serde::Serialize;
use slotstate_core::{
    delegate, EventKind, KeyValueStore, ReducerDelegate, SlotId, Snapshot, State, StoreError,
    StoreResult, StoredEnvelope,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Persistence settings for one slot
pub struct StorageBinding<T> {
    storage: Arc<dyn KeyValueStore>,
    key: String,
    ttl: Option<Duration>,
    initializer: Option<ReducerDelegate<T>>,
}

impl<T: State + Serialize + DeserializeOwned> StorageBinding<T> {
    pub fn new(storage: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
            ttl: None,
            initializer: None,
        }
    }

    /// Stored values older than `ttl` are discarded on load
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Reducer submitted (deferred) when nothing usable was stored
    pub fn with_initializer<F, Fut>(mut self, initializer: F) -> Self
    where
        F: FnOnce(Option<Snapshot<T>>) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        self.initializer = Some(delegate(initializer));
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    fn ttl_ms(&self) -> Option<u64> {
        self.ttl.map(|ttl| ttl.as_millis() as u64)
    }

    /// Read the stored value, dropping it if expired or unreadable
    fn load(&self, ctx: &StoreContext) -> Option<T> {
        let data = match self.storage.retrieve(&self.key) {
            Ok(Some(data)) => data,
            Ok(None) => return None,
            Err(err) => {
                warn!("Failed to read stored value `{}`: {}", self.key, err);
                return None;
            }
        };

        let envelope = match StoredEnvelope::<T>::decode(&data) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!("Discarding unreadable stored value `{}`: {}", self.key, err);
                return None;
            }
        };

        if envelope.is_expired(ctx.clock.now_ms()) {
            debug!("Stored value `{}` expired", self.key);
            if let Err(err) = self.storage.delete(&self.key) {
                warn!("Failed to delete expired value `{}`: {}", self.key, err);
            }
            return None;
        }

        Some(envelope.value)
    }

    fn saver(&self) -> Saver<T> {
        let storage = Arc::clone(&self.storage);
        let key = self.key.clone();
        let ttl_ms = self.ttl_ms();

        Arc::new(move |ctx: &StoreContext, slot: &SlotId, value: &T| {
            let envelope = StoredEnvelope::new(value, ctx.clock.now_ms(), ttl_ms);
            match envelope
                .encode()
                .and_then(|data| storage.store(&key, data))
            {
                Ok(()) => ctx
                    .logs
                    .log(slot, EventKind::StorageSaved, Some(value), None, None),
                Err(err) => warn!("Failed to save slot `{}` to `{}`: {}", slot, key, err),
            }
        })
    }
}

impl<T: State + Serialize + DeserializeOwned> Slot<T> {
    /// Install a binding before the slot sees its first reducer
    pub(crate) fn bind_storage(
        self: &Arc<Self>,
        binding: StorageBinding<T>,
    ) -> StoreResult<Option<ReduceHandle>> {
        let loaded = binding.load(&self.ctx);
        let saver = binding.saver();

        let seeded = {
            let mut entry = self.lock();
            if entry.saver.is_some() {
                return Err(StoreError::config_error(format!(
                    "slot `{}` already has a storage binding",
                    self.id
                )));
            }
            if entry.is_initiated {
                return Err(StoreError::config_error(format!(
                    "slot `{}` received reducers before its storage binding",
                    self.id
                )));
            }

            entry.saver = Some(saver);
            match loaded {
                Some(value) => {
                    entry.value = Some(Arc::new(value));
                    entry.is_initiated = true;
                    self.ctx.logs.log(
                        &self.id,
                        EventKind::StorageLoaded,
                        entry.value.as_deref(),
                        None,
                        None,
                    );
                    true
                }
                None => false,
            }
        };

        if seeded {
            return Ok(None);
        }

        Ok(binding.initializer.map(|initializer| {
            self.submit(initializer, None, EventKind::LazyReduceByDelegate, true)
        }))
    }
}
