//! Debounced reducer tasks
//!
//! `execute` schedules a submission after a quiet period. A newer call
//! replaces a scheduled-but-not-yet-submitted one, whose handle settles with
//! [`StoreError::Superseded`]. Once submitted, an execution runs to completion
//! like any other reducer.

use crate::queue::ReduceHandle;
use crate::store::Store;
use slotstate_core::{Reducer, StoreError, StoreResult};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::trace;

struct Scheduled {
    generation: u64,
    reply: oneshot::Sender<StoreResult<()>>,
}

#[derive(Default)]
struct DebounceState {
    generation: u64,
    scheduled: Option<Scheduled>,
}

/// A named reducer behind a debounce delay
pub struct DebouncedReducer<R: Reducer> {
    store: Store,
    reducer: Arc<R>,
    delay: Duration,
    state: Arc<Mutex<DebounceState>>,
}

impl<R: Reducer> DebouncedReducer<R> {
    pub(crate) fn new(store: Store, reducer: Arc<R>, delay: Duration) -> Self {
        Self {
            store,
            reducer,
            delay,
            state: Arc::new(Mutex::new(DebounceState::default())),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedule `args` for submission after the delay
    pub fn execute(&self, args: R::Args) -> ReduceHandle {
        let (reply, receiver) = oneshot::channel();

        let generation = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.generation += 1;
            let generation = state.generation;
            if let Some(replaced) = state.scheduled.replace(Scheduled { generation, reply }) {
                trace!("Debounced execution {} superseded", replaced.generation);
                let _ = replaced.reply.send(Err(StoreError::Superseded));
            }
            generation
        };

        let store = self.store.clone();
        let reducer = Arc::clone(&self.reducer);
        let state = Arc::clone(&self.state);
        let delay = self.delay;

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            let reply = {
                let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
                match state.scheduled.take() {
                    Some(scheduled) if scheduled.generation == generation => scheduled.reply,
                    other => {
                        // Superseded while sleeping; leave the newer one alone
                        state.scheduled = other;
                        return;
                    }
                }
            };

            let outcome = match store.submit_reducer(reducer, args, false) {
                Ok(handle) => handle.await,
                Err(err) => Err(err),
            };
            let _ = reply.send(outcome);
        });

        ReduceHandle::new(self.reducer.slot().id().clone(), receiver)
    }
}

impl<R: Reducer> fmt::Debug for DebouncedReducer<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DebouncedReducer")
            .field("reducer", &std::any::type_name::<R>())
            .field("delay", &self.delay)
            .finish()
    }
}
