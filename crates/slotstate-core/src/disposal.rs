//! Disposal binding
//!
//! A [`DisposalScope`] belongs to some owner (a view, a session, a request)
//! and collects cleanup callbacks. Disposing the scope, explicitly or by
//! dropping its last handle, runs them once in registration order.

use crate::errors::{StoreError, StoreResult};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

type Cleanup = Box<dyn FnOnce() + Send + 'static>;

#[derive(Default)]
struct ScopeInner {
    disposed: bool,
    cleanups: Vec<Cleanup>,
}

impl ScopeInner {
    fn take_cleanups(&mut self) -> Vec<Cleanup> {
        self.disposed = true;
        std::mem::take(&mut self.cleanups)
    }
}

impl Drop for ScopeInner {
    fn drop(&mut self) {
        for cleanup in self.take_cleanups() {
            cleanup();
        }
    }
}

/// Owner-side handle collecting cleanup callbacks
#[derive(Clone, Default)]
pub struct DisposalScope {
    inner: Arc<Mutex<ScopeInner>>,
}

impl DisposalScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a cleanup; fails if the scope is already disposed
    pub fn on_dispose<F>(&self, cleanup: F) -> StoreResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if inner.disposed {
            return Err(StoreError::ScopeDisposed);
        }
        inner.cleanups.push(Box::new(cleanup));
        Ok(())
    }

    /// Run every registered cleanup; later calls are no-ops
    pub fn dispose(&self) {
        let cleanups = self
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take_cleanups();
        // Cleanups run unlocked so they may touch this scope
        for cleanup in cleanups {
            cleanup();
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .disposed
    }
}

impl fmt::Debug for DisposalScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("DisposalScope")
            .field("disposed", &inner.disposed)
            .field("pending", &inner.cleanups.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_dispose_runs_cleanups_once() {
        let scope = DisposalScope::new();
        let runs = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let runs = runs.clone();
            scope
                .on_dispose(move || {
                    runs.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
        }

        scope.dispose();
        scope.dispose();
        assert_eq!(runs.load(Ordering::SeqCst), 3);
        assert!(scope.is_disposed());
    }

    #[test]
    fn test_register_after_dispose_fails() {
        let scope = DisposalScope::new();
        scope.dispose();
        assert!(matches!(
            scope.on_dispose(|| {}),
            Err(StoreError::ScopeDisposed)
        ));
    }

    #[test]
    fn test_drop_of_last_handle_disposes() {
        let runs = Arc::new(AtomicUsize::new(0));
        {
            let scope = DisposalScope::new();
            let clone = scope.clone();
            let runs_cb = runs.clone();
            clone
                .on_dispose(move || {
                    runs_cb.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
            drop(clone);
            assert_eq!(runs.load(Ordering::SeqCst), 0);
        }
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }
}
