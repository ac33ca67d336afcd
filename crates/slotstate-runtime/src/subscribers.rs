//! Subscriber Registry
//!
//! Live observers of a slot, notified in registration order once per
//! successful commit. Delivery happens in the commit's own lock scope, ahead
//! of the getters waiting on it, so a reader that suspends the slot right
//! after a commit cannot hide that commit from subscribers. Removal happens
//! under the slot lock, so nothing is delivered to a subscription after it
//! is torn down.

use crate::entry::{Slot, StateEntry, Subscriber};
use futures::{Stream, StreamExt};
use slotstate_core::{DisposalScope, EventKind, Snapshot, State, StoreResult};
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

// ----------------------------------------------------------------------------
// Subscription
// ----------------------------------------------------------------------------

/// Stream of snapshots delivered to one observer
///
/// The stream ends when the store drops the slot. Dropping the subscription
/// unsubscribes it.
pub struct Subscription<T: State> {
    id: Uuid,
    slot: Weak<Slot<T>>,
    receiver: mpsc::UnboundedReceiver<Snapshot<T>>,
}

impl<T: State> Subscription<T> {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Next delivered snapshot, or `None` once the stream has ended
    pub async fn recv(&mut self) -> Option<Snapshot<T>> {
        self.receiver.recv().await
    }

    /// Snapshot already delivered and not yet consumed
    pub fn try_recv(&mut self) -> Option<Snapshot<T>> {
        self.receiver.try_recv().ok()
    }

    /// Stop receiving; snapshots buffered but not yet consumed are discarded
    pub fn unsubscribe(&mut self) {
        if let Some(slot) = std::mem::take(&mut self.slot).upgrade() {
            slot.remove_subscriber(self.id);
        }
        self.receiver.close();
        while self.receiver.try_recv().is_ok() {}
    }

    pub fn is_active(&self) -> bool {
        self.slot.strong_count() > 0
    }
}

impl<T: State> Stream for Subscription<T> {
    type Item = Snapshot<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

impl<T: State> Drop for Subscription<T> {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.upgrade() {
            slot.remove_subscriber(self.id);
        }
    }
}

impl<T: State> std::fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Registration and Notification
// ----------------------------------------------------------------------------

impl<T: State> Slot<T> {
    pub(crate) fn observe(self: &Arc<Self>) -> Subscription<T> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();

        let claimed = {
            let mut entry = self.lock();
            self.ctx.logs.log(
                &self.id,
                EventKind::SubscriberAdded,
                entry.value.as_deref(),
                None,
                None,
            );

            // Owed what a getter issued now would resolve with
            let owed_initial = entry.is_initiated && !entry.is_suspended;
            let mut initial_barrier = None;
            if owed_initial {
                if entry.is_settled() {
                    if let Some(value) = entry.value.as_ref() {
                        self.notify(&sender, value);
                    }
                } else {
                    initial_barrier = Some(entry.enqueued);
                }
            }

            entry.subscribers.push(Subscriber {
                id,
                sender,
                initial_barrier,
            });
            owed_initial && entry.try_claim()
        };

        if claimed {
            self.spawn_drain();
        }

        Subscription {
            id,
            slot: Arc::downgrade(self),
            receiver,
        }
    }

    pub(crate) fn remove_subscriber(&self, id: Uuid) -> bool {
        let mut entry = self.lock();
        let Some(index) = entry.subscribers.iter().position(|s| s.id == id) else {
            return false;
        };
        entry.subscribers.remove(index);
        self.ctx.logs.log(
            &self.id,
            EventKind::SubscriberRemoved,
            entry.value.as_deref(),
            None,
            None,
        );
        true
    }

    /// Report the outcome of commit attempt `seq`. Every subscriber hears
    /// about a successful commit; a subscriber whose initial barrier is
    /// `seq` gets the settled value even when the attempt failed.
    ///
    /// Called under the slot lock right after the attempt cleared the
    /// suspension flag.
    pub(crate) fn notify_subscribers(&self, entry: &mut StateEntry<T>, seq: u64, committed: bool) {
        let value = entry.value.clone();

        for subscriber in entry.subscribers.iter_mut() {
            let due = match subscriber.initial_barrier {
                Some(barrier) if seq < barrier => false,
                Some(_) => {
                    subscriber.initial_barrier = None;
                    true
                }
                None => committed,
            };
            if !due {
                continue;
            }
            if let Some(value) = value.as_ref() {
                self.notify(&subscriber.sender, value);
            }
        }
    }

    fn notify(&self, sender: &mpsc::UnboundedSender<Snapshot<T>>, value: &Snapshot<T>) {
        let snapshot = self.ctx.deliver(value);
        self.ctx.logs.log(
            &self.id,
            EventKind::SubscriberNotification,
            Some(&*snapshot),
            None,
            None,
        );
        // A closed receiver is removed by its own teardown
        let _ = sender.send(snapshot);
    }
}

// ----------------------------------------------------------------------------
// Scope-bound Callbacks
// ----------------------------------------------------------------------------

/// Forward a subscription to `next` until `scope` is disposed
pub(crate) fn forward<T, F>(
    mut subscription: Subscription<T>,
    scope: &DisposalScope,
    mut next: F,
) -> StoreResult<()>
where
    T: State,
    F: FnMut(Snapshot<T>) + Send + 'static,
{
    let id = subscription.id();
    let slot = subscription.slot.clone();
    let task = tokio::spawn(async move {
        while let Some(snapshot) = subscription.next().await {
            next(snapshot);
        }
    });
    let abort = task.abort_handle();

    let teardown = {
        let slot = slot.clone();
        let abort = abort.clone();
        move || {
            if let Some(slot) = slot.upgrade() {
                slot.remove_subscriber(id);
            }
            abort.abort();
        }
    };

    if let Err(err) = scope.on_dispose(teardown) {
        // Disposed between the check and the registration
        if let Some(slot) = slot.upgrade() {
            slot.remove_subscriber(id);
        }
        abort.abort();
        return Err(err);
    }

    debug!("Subscription {} bound to disposal scope", id);
    Ok(())
}
