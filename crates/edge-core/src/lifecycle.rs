//! Worker lifecycle states and deferred completion.

use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

/// Lifecycle states of a worker instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkerState {
    /// Created, no lifecycle event handled yet.
    #[default]
    Parsed,
    /// Install event in progress.
    Installing,
    /// Installed, waiting to activate.
    Installed,
    /// Activate event in progress.
    Activating,
    /// Active and intercepting requests.
    Activated,
    /// Failed or replaced.
    Redundant,
}

impl WorkerState {
    /// Whether requests are intercepted in this state.
    pub fn can_intercept(&self) -> bool {
        matches!(self, Self::Activated)
    }
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parsed => write!(f, "parsed"),
            Self::Installing => write!(f, "installing"),
            Self::Installed => write!(f, "installed"),
            Self::Activating => write!(f, "activating"),
            Self::Activated => write!(f, "activated"),
            Self::Redundant => write!(f, "redundant"),
        }
    }
}

/// Deferred completion handle for an event.
///
/// Work spawned through this handle runs independently of the response
/// already handed back to the caller. The host awaits [`WaitUntil::settled`]
/// to keep the owning event alive until every task has finished.
#[derive(Debug, Clone, Default)]
pub struct WaitUntil {
    tasks: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl WaitUntil {
    /// Create an empty handle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a background task tied to this event.
    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(task);
        self.tasks.lock().push(handle);
    }

    /// Number of tasks that have not finished yet.
    pub fn pending(&self) -> usize {
        self.tasks.lock().iter().filter(|h| !h.is_finished()).count()
    }

    /// Wait for every spawned task, including tasks spawned while waiting.
    pub async fn settled(&self) {
        loop {
            let handles = std::mem::take(&mut *self.tasks.lock());
            if handles.is_empty() {
                return;
            }
            for handle in handles {
                if let Err(e) = handle.await {
                    tracing::warn!(error = %e, "background task did not complete");
                }
            }
        }
    }
}
