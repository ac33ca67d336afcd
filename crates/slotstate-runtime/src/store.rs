//! slotstate Store
//!
//! The [`Store`] is an explicit registry object: cloning it shares the same
//! slots. Every operation resolves its slot synchronously, so configuration
//! errors (a slot reused with another value type, an unregistered reducer, a
//! disposed scope) are returned at the call site. The returned futures only
//! wait for the queue.

use crate::builder::StoreBuilder;
use crate::debounce::DebouncedReducer;
use crate::entry::{Slot, StoreContext};
use crate::getters::StateGetter;
use crate::persistence::StorageBinding;
use crate::queue::ReduceHandle;
use crate::registry::{SlotInfo, SlotRegistry};
use crate::subscribers::{self, Subscription};
use serde::de::DeserializeOwned;
use serde::Serialize;
use slotstate_core::{
    delegate, DisposalScope, EventKind, LogManager, Reducer, Resolver, SlotKey, Snapshot, State,
    StoreConfig, StoreError, StoreResult,
};
use std::any::type_name;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

struct StoreInner {
    ctx: Arc<StoreContext>,
    slots: SlotRegistry,
}

/// Keyed state-coordination engine
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl Store {
    /// Store with the default configuration
    pub fn new() -> Self {
        StoreBuilder::new().build()
    }

    pub fn builder() -> StoreBuilder {
        StoreBuilder::new()
    }

    pub(crate) fn from_context(ctx: StoreContext) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                ctx: Arc::new(ctx),
                slots: SlotRegistry::default(),
            }),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.ctx.config
    }

    /// Runtime control of event logging
    pub fn logging(&self) -> &LogManager {
        &self.inner.ctx.logs
    }

    pub fn resolver(&self) -> &Resolver {
        &self.inner.ctx.resolver
    }

    fn slot<T: State>(&self, key: &SlotKey<T>) -> StoreResult<Arc<Slot<T>>> {
        self.inner.slots.slot(key, &self.inner.ctx)
    }

    fn render_args<A: fmt::Debug>(&self, args: &A) -> Option<String> {
        self.logging()
            .is_enabled()
            .then(|| format!("{:?}", args))
    }

    // ------------------------------------------------------------------------
    // Reducers
    // ------------------------------------------------------------------------

    /// Submit a named reducer and start draining its slot
    pub fn reduce<R: Reducer>(&self, reducer: R, args: R::Args) -> StoreResult<ReduceHandle> {
        self.submit_reducer(Arc::new(reducer), args, false)
    }

    /// Queue a named reducer without starting a drain
    pub fn reduce_deferred<R: Reducer>(
        &self,
        reducer: R,
        args: R::Args,
    ) -> StoreResult<ReduceHandle> {
        self.submit_reducer(Arc::new(reducer), args, true)
    }

    /// Submit the reducer registered for `R` with the store's resolver
    pub fn dispatch<R: Reducer>(&self, args: R::Args) -> StoreResult<ReduceHandle> {
        self.submit_reducer(self.resolve::<R>()?, args, false)
    }

    pub fn dispatch_deferred<R: Reducer>(&self, args: R::Args) -> StoreResult<ReduceHandle> {
        self.submit_reducer(self.resolve::<R>()?, args, true)
    }

    /// Submit an ad-hoc transform
    pub fn reduce_by<T, F, Fut>(&self, key: &SlotKey<T>, transform: F) -> StoreResult<ReduceHandle>
    where
        T: State,
        F: FnOnce(Option<Snapshot<T>>) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let slot = self.slot(key)?;
        Ok(slot.submit(delegate(transform), None, EventKind::ReduceByDelegate, false))
    }

    pub fn reduce_by_deferred<T, F, Fut>(
        &self,
        key: &SlotKey<T>,
        transform: F,
    ) -> StoreResult<ReduceHandle>
    where
        T: State,
        F: FnOnce(Option<Snapshot<T>>) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let slot = self.slot(key)?;
        Ok(slot.submit(
            delegate(transform),
            None,
            EventKind::LazyReduceByDelegate,
            true,
        ))
    }

    /// Debounced executor for a named reducer; `None` uses the configured
    /// delay
    pub fn reducer_task<R: Reducer>(
        &self,
        reducer: R,
        delay: Option<Duration>,
    ) -> DebouncedReducer<R> {
        let delay = delay.unwrap_or_else(|| self.config().debounce_delay());
        DebouncedReducer::new(self.clone(), Arc::new(reducer), delay)
    }

    pub(crate) fn submit_reducer<R: Reducer>(
        &self,
        reducer: Arc<R>,
        args: R::Args,
        deferred: bool,
    ) -> StoreResult<ReduceHandle> {
        let slot = self.slot(&reducer.slot())?;
        let rendered = self.render_args(&args);
        let kind = if deferred {
            EventKind::LazyReducer
        } else {
            EventKind::Reducer
        };

        let transform = delegate::<R::State, _, _>(move |state| async move {
            reducer.reduce(state, args).await
        });
        Ok(slot.submit(transform, rendered, kind, deferred))
    }

    fn resolve<R: Reducer>(&self) -> StoreResult<Arc<R>> {
        self.resolver()
            .resolve::<R>()
            .ok_or(StoreError::ReducerNotRegistered {
                type_name: type_name::<R>(),
            })
    }

    // ------------------------------------------------------------------------
    // Readers
    // ------------------------------------------------------------------------

    /// Value committed by the reducers submitted before this call
    pub fn get<T: State>(&self, key: &SlotKey<T>) -> StoreResult<StateGetter<T>> {
        Ok(self.slot(key)?.get())
    }

    pub fn get_or_default<T: State + Default>(
        &self,
        key: &SlotKey<T>,
    ) -> StoreResult<impl Future<Output = Snapshot<T>> + Send + 'static> {
        let getter = self.get(key)?;
        Ok(async move { getter.await.unwrap_or_default() })
    }

    /// Stream of values committed from now on, starting with the current one
    /// when the slot is initiated and not suspended
    pub fn observe<T: State>(&self, key: &SlotKey<T>) -> StoreResult<Subscription<T>> {
        Ok(self.slot(key)?.observe())
    }

    /// Deliver committed values to `next` until `scope` is disposed
    pub fn subscribe<T, F>(&self, key: &SlotKey<T>, scope: &DisposalScope, next: F) -> StoreResult<()>
    where
        T: State,
        F: FnMut(Snapshot<T>) + Send + 'static,
    {
        if scope.is_disposed() {
            return Err(StoreError::ScopeDisposed);
        }
        let subscription = self.observe(key)?;
        subscribers::forward(subscription, scope, next)
    }

    /// Freeze delivery for `key` once the work queued ahead has settled
    pub fn suspend<T: State>(
        &self,
        key: &SlotKey<T>,
    ) -> StoreResult<impl Future<Output = ()> + Send + 'static> {
        Ok(self.slot(key)?.suspend())
    }

    // ------------------------------------------------------------------------
    // Persistence and Diagnostics
    // ------------------------------------------------------------------------

    /// Load `key` from storage and save it after every commit
    ///
    /// Returns the handle of the initializer when one was submitted.
    pub fn bind_storage<T>(
        &self,
        key: &SlotKey<T>,
        binding: StorageBinding<T>,
    ) -> StoreResult<Option<ReduceHandle>>
    where
        T: State + Serialize + DeserializeOwned,
    {
        self.slot(key)?.bind_storage(binding)
    }

    /// Diagnostics for every slot touched so far
    pub fn entries(&self) -> Vec<SlotInfo> {
        self.inner.slots.infos()
    }

    pub fn slot_count(&self) -> usize {
        self.inner.slots.len()
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("config", self.config())
            .field("slots", &self.slot_count())
            .finish()
    }
}
