//! Queue Ordering and Failure Isolation Tests
//!
//! Reducers on one slot commit in submission order without overlapping,
//! getters observe exactly the reducers queued ahead of them, and a failing,
//! panicking or stuck transform only affects what it must. Ordering is
//! checked under paused time and again on a multi-threaded runtime.

use async_trait::async_trait;
use proptest::prelude::*;
use slotstate_runtime::{Reducer, SlotKey, Snapshot, Store, StoreError, StoreResult};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout, Instant};

// ----------------------------------------------------------------------------
// Test Reducers
// ----------------------------------------------------------------------------

const STAMPS: SlotKey<Vec<u32>> = SlotKey::new("stamps");

/// Appends its id after sleeping
struct Stamp;

#[async_trait]
impl Reducer for Stamp {
    type State = Vec<u32>;
    type Args = (u32, u64);

    fn slot(&self) -> SlotKey<Vec<u32>> {
        STAMPS
    }

    async fn reduce(
        &self,
        state: Option<Snapshot<Vec<u32>>>,
        args: (u32, u64),
    ) -> anyhow::Result<Vec<u32>> {
        let (id, delay_ms) = args;
        sleep(Duration::from_millis(delay_ms)).await;
        let mut next = state.map(|s| (*s).clone()).unwrap_or_default();
        next.push(id);
        Ok(next)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Counter {
    value: u32,
    commits: Vec<u64>,
}

const COUNTER: SlotKey<Counter> = SlotKey::new("counter");

/// Increments after a delay; tracks overlapping runs
struct Increment {
    running: Arc<AtomicUsize>,
    overlapped: Arc<AtomicBool>,
}

impl Increment {
    fn new() -> Self {
        Self {
            running: Arc::new(AtomicUsize::new(0)),
            overlapped: Arc::new(AtomicBool::new(false)),
        }
    }
}

#[async_trait]
impl Reducer for Increment {
    type State = Counter;
    type Args = u64;

    fn slot(&self) -> SlotKey<Counter> {
        COUNTER
    }

    async fn reduce(&self, state: Option<Snapshot<Counter>>, delay_ms: u64) -> anyhow::Result<Counter> {
        if self.running.fetch_add(1, Ordering::SeqCst) > 0 {
            self.overlapped.store(true, Ordering::SeqCst);
        }
        sleep(Duration::from_millis(delay_ms)).await;
        self.running.fetch_sub(1, Ordering::SeqCst);

        let mut next = state.map(|s| (*s).clone()).unwrap_or_default();
        next.value += 1;
        next.commits.push(delay_ms);
        Ok(next)
    }
}

// ----------------------------------------------------------------------------
// Ordering
// ----------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_reducers_commit_in_submission_order() -> StoreResult<()> {
    let store = Store::new();
    let handles = vec![
        store.reduce(Stamp, (1, 300))?,
        store.reduce(Stamp, (2, 100))?,
        store.reduce(Stamp, (3, 50))?,
        store.reduce(Stamp, (4, 0))?,
    ];

    for handle in handles {
        handle.await?;
    }

    let value = store.get(&STAMPS)?.await.expect("slot has a value");
    assert_eq!(*value, vec![1, 2, 3, 4]);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_counter_scenario() -> StoreResult<()> {
    let store = Store::new();
    let increment = Increment::new();
    let overlapped = increment.overlapped.clone();
    let reducer = Arc::new(increment);

    let start = Instant::now();
    let mut tasks = Vec::new();
    for delay_ms in [300, 100, 50] {
        let handle = store.reduce(SharedIncrement(reducer.clone()), delay_ms)?;
        tasks.push(tokio::spawn(async move {
            handle.await.map(|()| start.elapsed())
        }));
    }

    let mut settled_at = Vec::new();
    for task in tasks {
        settled_at.push(task.await.expect("task joined")?);
    }

    // Each handle settles only after its own transform, in submission order
    assert!(settled_at[0] >= Duration::from_millis(300));
    assert!(settled_at[1] >= Duration::from_millis(400));
    assert!(settled_at[2] >= Duration::from_millis(450));
    assert!(settled_at[0] <= settled_at[1] && settled_at[1] <= settled_at[2]);

    let counter = store.get(&COUNTER)?.await.expect("counter committed");
    assert_eq!(counter.value, 3);
    assert_eq!(counter.commits, vec![300, 100, 50]);
    assert!(!overlapped.load(Ordering::SeqCst), "transforms overlapped");
    Ok(())
}

/// Lets several submissions share one `Increment` and its overlap tracking
struct SharedIncrement(Arc<Increment>);

#[async_trait]
impl Reducer for SharedIncrement {
    type State = Counter;
    type Args = u64;

    fn slot(&self) -> SlotKey<Counter> {
        COUNTER
    }

    async fn reduce(&self, state: Option<Snapshot<Counter>>, delay_ms: u64) -> anyhow::Result<Counter> {
        self.0.reduce(state, delay_ms).await
    }
}

#[tokio::test(start_paused = true)]
async fn test_get_sees_only_reducers_queued_before_it() -> StoreResult<()> {
    let store = Store::new();
    let first = store.reduce(Stamp, (1, 100))?;
    let getter = store.get(&STAMPS)?;
    let second = store.reduce(Stamp, (2, 10))?;

    let seen = getter.await.expect("value after first reducer");
    assert_eq!(*seen, vec![1]);

    first.await?;
    second.await?;
    assert_eq!(*store.get(&STAMPS)?.await.unwrap(), vec![1, 2]);
    Ok(())
}

#[tokio::test]
async fn test_get_on_untouched_slot_is_none() -> StoreResult<()> {
    let store = Store::new();
    assert!(store.get(&STAMPS)?.await.is_none());
    assert_eq!(*store.get_or_default(&COUNTER)?.await, Counter::default());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_dropped_handle_does_not_cancel_transform() -> StoreResult<()> {
    let store = Store::new();
    drop(store.reduce(Stamp, (7, 200))?);

    let value = store.get(&STAMPS)?.await.expect("transform still ran");
    assert_eq!(*value, vec![7]);
    Ok(())
}

// ----------------------------------------------------------------------------
// Multi-threaded Runtime
// ----------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_counter_scenario_multi_thread() -> StoreResult<()> {
    let store = Store::new();
    let increment = Increment::new();
    let overlapped = increment.overlapped.clone();
    let reducer = Arc::new(increment);

    let start = Instant::now();
    let mut tasks = Vec::new();
    for delay_ms in [60, 20, 10] {
        let handle = store.reduce(SharedIncrement(reducer.clone()), delay_ms)?;
        tasks.push(tokio::spawn(async move {
            handle.await.map(|()| start.elapsed())
        }));
    }

    let mut settled_at = Vec::new();
    for task in tasks {
        settled_at.push(task.await.expect("task joined")?);
    }

    assert!(settled_at[0] >= Duration::from_millis(60));
    assert!(settled_at[1] >= Duration::from_millis(80));
    assert!(settled_at[2] >= Duration::from_millis(90));

    let counter = store.get(&COUNTER)?.await.expect("counter committed");
    assert_eq!(counter.value, 3);
    assert_eq!(counter.commits, vec![60, 20, 10]);
    assert!(!overlapped.load(Ordering::SeqCst), "transforms overlapped");
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_submitters_never_overlap() -> StoreResult<()> {
    let store = Store::new();
    let increment = Increment::new();
    let overlapped = increment.overlapped.clone();
    let reducer = Arc::new(increment);

    let submitters: Vec<_> = (0..8)
        .map(|_| {
            let store = store.clone();
            let reducer = reducer.clone();
            tokio::spawn(async move {
                for _ in 0..5 {
                    store.reduce(SharedIncrement(reducer.clone()), 1)?.await?;
                }
                StoreResult::Ok(())
            })
        })
        .collect();

    for submitter in submitters {
        submitter.await.expect("submitter joined")?;
    }

    let counter = store.get(&COUNTER)?.await.expect("counter committed");
    assert_eq!(counter.value, 40);
    assert!(!overlapped.load(Ordering::SeqCst), "transforms overlapped");
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_get_after_submit_sees_own_commit_across_threads() -> StoreResult<()> {
    let store = Store::new();

    let readers: Vec<_> = (0..16u32)
        .map(|id| {
            let store = store.clone();
            tokio::spawn(async move {
                let handle = store.reduce(Stamp, (id, 1))?;
                let seen = store.get(&STAMPS)?.await;
                handle.await?;
                StoreResult::Ok((id, seen))
            })
        })
        .collect();

    for reader in readers {
        let (id, seen) = reader.await.expect("reader joined")?;
        let seen = seen.expect("value after own commit");
        assert!(seen.contains(&id), "reader {id} missed its own commit");
    }
    assert_eq!(store.get(&STAMPS)?.await.unwrap().len(), 16);
    Ok(())
}

// ----------------------------------------------------------------------------
// Deferred Submission
// ----------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_deferred_reducer_waits_for_trigger() -> StoreResult<()> {
    let store = Store::new();
    let ran = Arc::new(AtomicBool::new(false));

    let flag = ran.clone();
    let handle = store.reduce_by_deferred(&STAMPS, move |_| async move {
        flag.store(true, Ordering::SeqCst);
        Ok(vec![42])
    })?;

    sleep(Duration::from_secs(5)).await;
    assert!(!ran.load(Ordering::SeqCst), "deferred reducer ran on its own");

    let value = store.get(&STAMPS)?.await.expect("get drained deferred work");
    assert!(ran.load(Ordering::SeqCst));
    assert_eq!(*value, vec![42]);
    handle.await?;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_deferred_reducer_runs_with_next_submission() -> StoreResult<()> {
    let store = Store::new();
    let deferred = store.reduce_deferred(Stamp, (1, 0))?;
    let immediate = store.reduce(Stamp, (2, 0))?;

    deferred.await?;
    immediate.await?;
    assert_eq!(*store.get(&STAMPS)?.await.unwrap(), vec![1, 2]);
    Ok(())
}

// ----------------------------------------------------------------------------
// Failure Isolation
// ----------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_failed_reducer_keeps_value_and_queue_moves_on() -> StoreResult<()> {
    let store = Store::new();
    let first = store.reduce(Stamp, (1, 10))?;
    let failing = store.reduce_by(&STAMPS, |_| async { anyhow::bail!("backend unavailable") })?;
    let getter = store.get(&STAMPS)?;
    let last = store.reduce(Stamp, (3, 10))?;

    first.await?;
    match failing.await {
        Err(StoreError::ReducerFailed { slot, source }) => {
            assert_eq!(slot.as_str(), "stamps");
            assert_eq!(source.to_string(), "backend unavailable");
        }
        other => panic!("expected reducer failure, got {other:?}"),
    }

    // The getter sees the value from before the failed reducer
    assert_eq!(*getter.await.unwrap(), vec![1]);
    last.await?;
    assert_eq!(*store.get(&STAMPS)?.await.unwrap(), vec![1, 3]);
    Ok(())
}

#[tokio::test]
async fn test_panicking_reducer_is_rejected() -> StoreResult<()> {
    let store = Store::new();
    store.reduce(Stamp, (1, 0))?.await?;

    let panicking = store.reduce_by(&STAMPS, |_| async { panic!("reducer bug") })?;
    let after = store.reduce(Stamp, (2, 0))?;

    assert!(matches!(
        panicking.await,
        Err(StoreError::ReducerPanicked { .. })
    ));
    after.await?;
    assert_eq!(*store.get(&STAMPS)?.await.unwrap(), vec![1, 2]);
    Ok(())
}

#[tokio::test]
async fn test_stuck_transform_stalls_only_its_slot() -> StoreResult<()> {
    let stuck: SlotKey<u32> = SlotKey::new("stuck");
    let healthy: SlotKey<u32> = SlotKey::new("healthy");
    let store = Store::new();

    let _never = store.reduce_by(&stuck, |_| async {
        futures::future::pending::<()>().await;
        Ok(0)
    })?;
    let queued = store.reduce_by(&stuck, |_| async { Ok(1) })?;

    store.reduce_by(&healthy, |_| async { Ok(5) })?.await?;
    assert_eq!(*store.get(&healthy)?.await.unwrap(), 5);

    let stalled_get = store.get(&stuck)?;
    assert!(timeout(Duration::from_millis(50), stalled_get).await.is_err());
    assert!(timeout(Duration::from_millis(50), queued).await.is_err());

    let info = store
        .entries()
        .into_iter()
        .find(|info| info.id.as_str() == "stuck")
        .expect("stuck slot listed");
    assert!(info.is_busy);
    assert_eq!(info.pending_reducers, 1);
    Ok(())
}

// ----------------------------------------------------------------------------
// Ordering Property
// ----------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_commit_order_matches_submission_order(delays in prop::collection::vec(0u64..200, 1..12)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
            .unwrap();

        let committed = runtime.block_on(async {
            let store = Store::new();
            let handles: Vec<_> = delays
                .iter()
                .enumerate()
                .map(|(id, delay)| store.reduce(Stamp, (id as u32, *delay)).unwrap())
                .collect();
            for handle in handles {
                handle.await.unwrap();
            }
            store.get(&STAMPS).unwrap().await.unwrap()
        });

        let expected: Vec<u32> = (0..delays.len() as u32).collect();
        prop_assert_eq!(&*committed, &expected);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_commit_order_matches_submission_order_multi_thread(delays in prop::collection::vec(0u64..15, 1..10)) {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(4)
            .enable_all()
            .build()
            .unwrap();

        let committed = runtime.block_on(async {
            let store = Store::new();
            let handles: Vec<_> = delays
                .iter()
                .enumerate()
                .map(|(id, delay)| store.reduce(Stamp, (id as u32, *delay)).unwrap())
                .collect();
            // Await from other workers so settlement is observed off-thread
            let waiters: Vec<_> = handles.into_iter().map(tokio::spawn).collect();
            for waiter in waiters {
                waiter.await.unwrap().unwrap();
            }
            store.get(&STAMPS).unwrap().await.unwrap()
        });

        let expected: Vec<u32> = (0..delays.len() as u32).collect();
        prop_assert_eq!(&*committed, &expected);
    }
}
