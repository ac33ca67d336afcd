//! Suspend/Resume Controller
//!
//! Suspending a slot parks new getters and withholds the initial push from
//! new subscribers once the queue ahead of the call has settled. Commits that
//! settled before the suspension took effect have already reached
//! subscribers. There is no explicit resume: the next reducer commit attempt,
//! successful or not, clears the flag and releases parked getters.

use crate::entry::Slot;
use slotstate_core::{EventKind, State};
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

impl<T: State> Slot<T> {
    pub(crate) fn suspend(self: &Arc<Self>) -> impl Future<Output = ()> + Send + 'static {
        let settled = self.get();
        let slot = Arc::clone(self);

        async move {
            settled.await;
            slot.mark_suspended();
        }
    }

    fn mark_suspended(&self) {
        let mut entry = self.lock();
        entry.is_suspended = true;
        debug!("Slot `{}` suspended", self.id);
        self.ctx.logs.log(
            &self.id,
            EventKind::StateSuspended,
            entry.value.as_deref(),
            None,
            None,
        );
    }
}
