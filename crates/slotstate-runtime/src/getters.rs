//! Getter Coordinator
//!
//! A getter resolves once every reducer enqueued before it has settled, and
//! never waits for reducers enqueued after it. While a slot is suspended new
//! getters are parked until the next commit attempt.

use crate::entry::{GetterRequest, Slot, StateEntry};
use slotstate_core::{EventKind, Snapshot, State};
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// Pending read of a slot's settled value
///
/// Resolves to `None` while the slot has no value, or if the store goes away
/// before the read is serviced.
#[must_use = "a state getter does nothing unless awaited"]
#[derive(Debug)]
pub struct StateGetter<T> {
    receiver: oneshot::Receiver<Option<Snapshot<T>>>,
}

impl<T> Future for StateGetter<T> {
    type Output = Option<Snapshot<T>>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|outcome| outcome.ok().flatten())
    }
}

impl<T: State> Slot<T> {
    pub(crate) fn get(self: &Arc<Self>) -> StateGetter<T> {
        let (reply, receiver) = oneshot::channel();

        let claimed = {
            let mut entry = self.lock();
            self.ctx.logs.log(
                &self.id,
                EventKind::StateGetter,
                entry.value.as_deref(),
                None,
                None,
            );

            let request = GetterRequest::new(reply, entry.enqueued);
            if entry.is_suspended {
                entry.suspended_getters.push_back(request);
            } else {
                entry.pending_getters.push_back(request);
            }

            // Deferred work queued ahead of this read must run first
            let claimed = entry.try_claim();
            self.flush_getters(&mut entry);
            claimed
        };

        if claimed {
            self.spawn_drain();
        }

        StateGetter { receiver }
    }

    /// Resolve the queued getters whose preceding reducers have all settled.
    /// Parked getters are included only once the slot is no longer suspended.
    pub(crate) fn flush_getters(&self, entry: &mut StateEntry<T>) {
        let settled = entry.settled;
        let mut getters = take_ready(&mut entry.pending_getters, settled);
        if !entry.is_suspended {
            getters.extend(take_ready(&mut entry.suspended_getters, settled));
        }

        for getter in getters {
            let snapshot = entry.value.as_ref().map(|value| self.ctx.deliver(value));
            self.ctx.logs.log(
                &self.id,
                EventKind::StateGetterResolved,
                snapshot.as_deref(),
                None,
                Some(getter.requested_at.elapsed()),
            );
            // The reader may have stopped waiting
            let _ = getter.reply.send(snapshot);
        }
    }
}

/// Pop the leading requests whose barrier has been reached. Barriers are
/// non-decreasing along each queue.
fn take_ready<T>(queue: &mut VecDeque<GetterRequest<T>>, settled: u64) -> Vec<GetterRequest<T>> {
    let mut ready = Vec::new();
    while queue.front().is_some_and(|getter| getter.barrier <= settled) {
        ready.extend(queue.pop_front());
    }
    ready
}
