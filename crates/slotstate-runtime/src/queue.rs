//! Task Queue Engine
//!
//! Reducers for one slot run strictly one at a time in submission order:
//! - Submission enqueues synchronously and, unless deferred, claims the drain
//! - The drain is an explicit loop on a spawned task that keeps the busy claim
//!   until the queue is empty
//! - A failed or panicking transform rejects only its own submitter and
//!   leaves the committed value untouched
//! - Each commit attempt notifies subscribers and then releases the getters
//!   waiting on it, under one lock acquisition
//! - Commits bound to storage are written on the blocking pool, in commit
//!   order, before the submitter hears back
//! - When the queue empties, remaining getters are flushed and the claim is
//!   released under the same lock

use crate::entry::{ReducerTask, Saver, Slot, StateEntry};
use futures::FutureExt;
use instant::Instant;
use slotstate_core::{
    EventKind, ReducerDelegate, SlotId, Snapshot, State, StoreError, StoreResult,
};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use tracing::{debug, error, trace};

// ----------------------------------------------------------------------------
// Reduce Handle
// ----------------------------------------------------------------------------

/// Settles when the submitted transform settles
///
/// Dropping the handle does not cancel the transform; it only discards the
/// outcome.
#[must_use = "a reduce handle reports the outcome of its transform"]
#[derive(Debug)]
pub struct ReduceHandle {
    slot: SlotId,
    receiver: oneshot::Receiver<StoreResult<()>>,
}

impl ReduceHandle {
    pub(crate) fn new(slot: SlotId, receiver: oneshot::Receiver<StoreResult<()>>) -> Self {
        Self { slot, receiver }
    }

    pub fn slot(&self) -> &SlotId {
        &self.slot
    }
}

impl Future for ReduceHandle {
    type Output = StoreResult<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.receiver).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            Poll::Ready(Err(_)) => Poll::Ready(Err(StoreError::Dropped {
                slot: self.slot.clone(),
            })),
            Poll::Pending => Poll::Pending,
        }
    }
}

// ----------------------------------------------------------------------------
// Submission and Drain
// ----------------------------------------------------------------------------

impl<T: State> Slot<T> {
    /// Enqueue a transform; `kind` names the submission form for logging
    pub(crate) fn submit(
        self: &Arc<Self>,
        transform: ReducerDelegate<T>,
        args: Option<String>,
        kind: EventKind,
        deferred: bool,
    ) -> ReduceHandle {
        let (reply, receiver) = oneshot::channel();

        let claimed = {
            let mut entry = self.lock();
            entry.is_initiated = true;
            self.ctx
                .logs
                .log(&self.id, kind, entry.value.as_deref(), args.as_deref(), None);
            entry.enqueued += 1;
            let seq = entry.enqueued;
            entry.pending_reducers.push_back(ReducerTask {
                seq,
                transform,
                args,
                reply,
            });
            !deferred && entry.try_claim()
        };

        if claimed {
            self.spawn_drain();
        }

        ReduceHandle::new(self.id.clone(), receiver)
    }

    /// Run a drain for a claim already taken under the lock
    pub(crate) fn spawn_drain(self: &Arc<Self>) {
        let slot = Arc::clone(self);
        tokio::spawn(slot.drain());
    }

    async fn drain(self: Arc<Self>) {
        trace!("Drain started for slot `{}`", self.id);

        loop {
            let (task, current) = {
                let mut entry = self.lock();
                let Some(task) = entry.pending_reducers.pop_front() else {
                    self.settle(&mut entry);
                    trace!("Drain finished for slot `{}`", self.id);
                    return;
                };
                self.ctx.logs.log(
                    &self.id,
                    EventKind::ReducerStarted,
                    entry.value.as_deref(),
                    task.args.as_deref(),
                    None,
                );
                (task, entry.value.clone())
            };

            let ReducerTask {
                seq,
                transform,
                args,
                reply,
            } = task;

            let started = Instant::now();
            let outcome = AssertUnwindSafe(async move { transform(current).await })
                .catch_unwind()
                .await;
            let elapsed = started.elapsed();

            let outcome = match outcome {
                Ok(Ok(next)) => Ok(next),
                Ok(Err(source)) => Err(StoreError::ReducerFailed {
                    slot: self.id.clone(),
                    source,
                }),
                Err(_) => {
                    error!("Reducer for slot `{}` panicked", self.id);
                    Err(StoreError::ReducerPanicked {
                        slot: self.id.clone(),
                    })
                }
            };

            let (reply_outcome, persist) = {
                let mut entry = self.lock();
                // Any commit attempt resumes a suspended slot
                entry.is_suspended = false;
                entry.settled = seq;

                let committed = outcome.is_ok();
                let result = match outcome {
                    Ok(next) => {
                        let next = Arc::new(next);
                        entry.value = Some(Arc::clone(&next));
                        self.ctx.logs.log(
                            &self.id,
                            EventKind::ReducerResolved,
                            Some(&*next),
                            args.as_deref(),
                            Some(elapsed),
                        );
                        (Ok(()), entry.saver.clone().map(|saver| (saver, next)))
                    }
                    Err(err) => {
                        debug!("Reducer for slot `{}` rejected: {}", self.id, err);
                        self.ctx.logs.log(
                            &self.id,
                            EventKind::ReducerRejected,
                            entry.value.as_deref(),
                            args.as_deref(),
                            Some(elapsed),
                        );
                        (Err(err), None)
                    }
                };

                // Subscribers hear about this attempt before any reader
                // waiting on it is released, so a suspend cannot cut in
                self.notify_subscribers(&mut entry, seq, committed);
                self.flush_getters(&mut entry);
                result
            };

            if let Some((saver, value)) = persist {
                self.persist(saver, value).await;
            }

            // The submitter may have dropped its handle
            let _ = reply.send(reply_outcome);
        }
    }

    /// Flush remaining getters and release the drain claim
    fn settle(&self, entry: &mut StateEntry<T>) {
        self.flush_getters(entry);
        entry.is_busy = false;
    }

    /// Write a committed value off the async workers. The drain waits for
    /// the write so stored values never go back in time.
    async fn persist(&self, saver: Saver<T>, value: Snapshot<T>) {
        let ctx = Arc::clone(&self.ctx);
        let id = self.id.clone();
        let write = tokio::task::spawn_blocking(move || saver(&*ctx, &id, &*value));
        if let Err(err) = write.await {
            error!("Saving slot `{}` failed: {}", self.id, err);
        }
    }
}
