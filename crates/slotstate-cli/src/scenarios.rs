//! Scripted scenarios
//!
//! Each scenario drives a [`Store`] through one behavior of the engine and
//! returns a serializable report that the command handlers print.

use crate::error::{CliError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use slotstate_core::{
    DisposalScope, KeyValueStore, LogLevel, Reducer, Resolver, SetState, SlotKey, Snapshot,
    StoreConfig, StoreError,
};
use slotstate_runtime::{SlotInfo, StorageBinding, Store};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info};

// ----------------------------------------------------------------------------
// Store Setup
// ----------------------------------------------------------------------------

/// Store with the scenario reducers registered
pub fn build_store(config: StoreConfig, trace_events: bool) -> Store {
    let resolver = Resolver::new();
    resolver.register_default::<Increment>();

    let mut builder = Store::builder().with_config(config).with_resolver(resolver);
    if trace_events {
        builder = builder.with_console_logging(LogLevel::Info);
    }
    builder.build()
}

// ----------------------------------------------------------------------------
// Counter
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Counter {
    pub value: u64,
    /// Delay of each committed increment, in commit order
    pub commits: Vec<u64>,
}

pub const COUNTER: SlotKey<Counter> = SlotKey::new("counter");

/// Adds one after sleeping for the submitted number of milliseconds
#[derive(Debug, Default)]
pub struct Increment;

#[async_trait]
impl Reducer for Increment {
    type State = Counter;
    type Args = u64;

    fn slot(&self) -> SlotKey<Counter> {
        COUNTER
    }

    async fn reduce(
        &self,
        state: Option<Snapshot<Counter>>,
        delay_ms: u64,
    ) -> anyhow::Result<Counter> {
        sleep(Duration::from_millis(delay_ms)).await;
        let mut next = state.map(|s| (*s).clone()).unwrap_or_default();
        next.value += 1;
        next.commits.push(delay_ms);
        Ok(next)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CounterReport {
    pub counter: Counter,
    /// Milliseconds from submission until each handle settled, in
    /// submission order
    pub settled_ms: Vec<u64>,
}

/// Submit one increment per delay at once and wait for all of them
pub async fn run_counter(store: &Store, delays: &[u64]) -> Result<CounterReport> {
    let start = Instant::now();
    let mut waiters = Vec::with_capacity(delays.len());
    for &delay_ms in delays {
        let handle = store.dispatch::<Increment>(delay_ms)?;
        waiters.push(tokio::spawn(async move {
            handle.await.map(|()| start.elapsed().as_millis() as u64)
        }));
    }

    let mut settled_ms = Vec::with_capacity(waiters.len());
    for waiter in waiters {
        let elapsed = waiter
            .await
            .map_err(|err| CliError::Scenario(format!("increment task failed: {err}")))??;
        settled_ms.push(elapsed);
    }

    let counter = store
        .get(&COUNTER)?
        .await
        .map(|counter| (*counter).clone())
        .unwrap_or_default();
    info!("Counter settled at {} after {:?}", counter.value, settled_ms);

    Ok(CounterReport {
        counter,
        settled_ms,
    })
}

// ----------------------------------------------------------------------------
// Suspend
// ----------------------------------------------------------------------------

pub const TITLE: SlotKey<String> = SlotKey::new("title");

#[derive(Debug, Clone, Serialize)]
pub struct SuspendReport {
    pub before: Option<String>,
    /// The parked read had not resolved before the next commit
    pub parked_until_commit: bool,
    pub resumed_with: Option<String>,
}

/// Suspend a slot, park a read on it, then commit a new value
pub async fn run_suspend(store: &Store, park_for: Duration) -> Result<SuspendReport> {
    let set = |value: &'static str| {
        store.reduce_by(&TITLE, move |_| async move { Ok(value.to_string()) })
    };

    set("draft")?.await?;
    store.suspend(&TITLE)?.await;
    let before = store.get(&TITLE)?.await.map(|title| (*title).clone());

    let parked = tokio::spawn(store.get(&TITLE)?);
    sleep(park_for).await;
    let parked_until_commit = !parked.is_finished();
    debug!("Parked read still pending: {}", parked_until_commit);

    set("published")?.await?;
    let resumed_with = parked
        .await
        .map_err(|err| CliError::Scenario(format!("parked read failed: {err}")))?
        .map(|title| (*title).clone());

    Ok(SuspendReport {
        before,
        parked_until_commit,
        resumed_with,
    })
}

// ----------------------------------------------------------------------------
// Persist
// ----------------------------------------------------------------------------

pub const VISITS: SlotKey<u64> = SlotKey::new("visits");

#[derive(Debug, Clone, Serialize)]
pub struct PersistReport {
    /// A stored value seeded the slot
    pub restored: bool,
    pub visits: u64,
}

/// Count one visit in a slot bound to `storage`
pub async fn run_persist(
    store: &Store,
    storage: Arc<dyn KeyValueStore>,
    ttl: Option<Duration>,
) -> Result<PersistReport> {
    let mut binding =
        StorageBinding::<u64>::new(storage, "visits").with_initializer(|_| async { Ok(0) });
    if let Some(ttl) = ttl {
        binding = binding.with_ttl(ttl);
    }

    let initializer = store.bind_storage(&VISITS, binding)?;
    let restored = initializer.is_none();

    store
        .reduce_by(&VISITS, |visits| async move {
            Ok(visits.map_or(0, |v| *v) + 1)
        })?
        .await?;
    if let Some(initializer) = initializer {
        initializer.await?;
    }

    let visits = store.get(&VISITS)?.await.map_or(0, |v| *v);
    Ok(PersistReport { restored, visits })
}

// ----------------------------------------------------------------------------
// Inspect
// ----------------------------------------------------------------------------

pub const QUERY: SlotKey<String> = SlotKey::new("query");

#[derive(Debug, Clone, Serialize)]
pub struct InspectReport {
    /// Debounced executions replaced before they ran
    pub superseded: usize,
    pub notifications: usize,
    pub slots: Vec<SlotInfo>,
}

/// Exercise every slot operation once and collect diagnostics
pub async fn run_inspect(store: &Store) -> Result<InspectReport> {
    let scope = DisposalScope::new();
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    store.subscribe(&QUERY, &scope, move |query: Snapshot<String>| {
        let _ = tx.send(query);
    })?;

    // Typing "s", "sl", "slot" quickly commits only the last query
    let search = store.reducer_task(SetState::new(QUERY), Some(Duration::from_millis(20)));
    let handles: Vec<_> = ["s", "sl", "slot"]
        .into_iter()
        .map(|query| search.execute(query.to_string()))
        .collect();

    let mut superseded = 0;
    for handle in handles {
        match handle.await {
            Ok(()) => {}
            Err(StoreError::Superseded) => superseded += 1,
            Err(err) => return Err(err.into()),
        }
    }

    store.dispatch::<Increment>(0)?.await?;
    let _queued = store.dispatch_deferred::<Increment>(0)?;

    let mut notifications = 0;
    while rx.try_recv().is_ok() {
        notifications += 1;
    }

    let slots = store.entries();
    scope.dispose();

    Ok(InspectReport {
        superseded,
        notifications,
        slots,
    })
}
