//! Background execution budget.
//!
//! Hosts that suspend idle processes can grant a short allowance to finish
//! in-flight work. A delivery attempt holds one for its whole duration.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifier of a granted allowance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BackgroundTaskId(pub u64);

/// Host hook that grants and revokes background allowances.
pub trait BackgroundTasks: Send + Sync + 'static {
    /// Request an allowance for the named work.
    fn begin(&self, name: &str) -> BackgroundTaskId;

    /// Release a previously granted allowance.
    fn end(&self, id: BackgroundTaskId);
}

/// [`BackgroundTasks`] for hosts that never suspend the process.
#[derive(Debug, Default)]
pub struct NoopBackgroundTasks {
    next_id: AtomicU64,
}

impl BackgroundTasks for NoopBackgroundTasks {
    fn begin(&self, name: &str) -> BackgroundTaskId {
        let id = BackgroundTaskId(self.next_id.fetch_add(1, Ordering::Relaxed));
        tracing::trace!(task = name, id = id.0, "Background task started");
        id
    }

    fn end(&self, id: BackgroundTaskId) {
        tracing::trace!(id = id.0, "Background task ended");
    }
}

/// Scoped allowance, released when dropped.
#[must_use = "the allowance is released as soon as the guard is dropped"]
pub struct BackgroundTaskGuard {
    tasks: Arc<dyn BackgroundTasks>,
    id: BackgroundTaskId,
}

impl BackgroundTaskGuard {
    /// Begin a background task that ends when the guard goes out of scope.
    pub fn acquire(tasks: Arc<dyn BackgroundTasks>, name: &str) -> Self {
        let id = tasks.begin(name);
        Self { tasks, id }
    }

    /// Identifier of the held allowance.
    pub fn id(&self) -> BackgroundTaskId {
        self.id
    }
}

impl Drop for BackgroundTaskGuard {
    fn drop(&mut self) {
        self.tasks.end(self.id);
    }
}

impl std::fmt::Debug for BackgroundTaskGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundTaskGuard")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording {
        inner: NoopBackgroundTasks,
        log: Mutex<Vec<String>>,
    }

    impl BackgroundTasks for Recording {
        fn begin(&self, name: &str) -> BackgroundTaskId {
            let id = self.inner.begin(name);
            self.log.lock().unwrap().push(format!("begin {name} {}", id.0));
            id
        }

        fn end(&self, id: BackgroundTaskId) {
            self.log.lock().unwrap().push(format!("end {}", id.0));
        }
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let tasks = Arc::new(Recording::default());
        {
            let first = BackgroundTaskGuard::acquire(tasks.clone(), "deliver");
            let second = BackgroundTaskGuard::acquire(tasks.clone(), "deliver");
            assert_ne!(first.id(), second.id());
        }
        let log = tasks.log.lock().unwrap().clone();
        assert_eq!(log, vec!["begin deliver 0", "begin deliver 1", "end 1", "end 0"]);
    }

    #[test]
    fn test_guard_releases_on_early_return() {
        fn attempt(tasks: Arc<dyn BackgroundTasks>) -> Result<(), &'static str> {
            let _guard = BackgroundTaskGuard::acquire(tasks, "deliver");
            Err("transport failed")
        }

        let tasks = Arc::new(Recording::default());
        assert!(attempt(tasks.clone()).is_err());
        assert_eq!(tasks.log.lock().unwrap().len(), 2);
    }
}
