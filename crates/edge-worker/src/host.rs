//! Host operations used by the lifecycle.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::error::LifecycleError;

/// Operations the host environment performs on the worker's behalf.
#[async_trait]
pub trait WorkerHost: Send + Sync {
    /// Activate as soon as installed, without waiting for older instances
    /// to be released.
    async fn skip_waiting(&self) -> Result<(), LifecycleError>;

    /// Take control of already-open clients.
    async fn claim_clients(&self) -> Result<(), LifecycleError>;
}

/// In-process host that records the calls it receives.
#[derive(Debug, Default)]
pub struct LocalHost {
    skip_waiting_calls: AtomicUsize,
    claim_calls: AtomicUsize,
    claim_failure: Option<String>,
}

impl LocalHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse every `claim_clients` call with `reason`.
    pub fn with_claim_failure(mut self, reason: impl Into<String>) -> Self {
        self.claim_failure = Some(reason.into());
        self
    }

    /// Number of `skip_waiting` calls.
    pub fn skip_waiting_calls(&self) -> usize {
        self.skip_waiting_calls.load(Ordering::SeqCst)
    }

    /// Number of `claim_clients` calls.
    pub fn claim_calls(&self) -> usize {
        self.claim_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WorkerHost for LocalHost {
    async fn skip_waiting(&self) -> Result<(), LifecycleError> {
        self.skip_waiting_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn claim_clients(&self) -> Result<(), LifecycleError> {
        self.claim_calls.fetch_add(1, Ordering::SeqCst);
        match &self.claim_failure {
            Some(reason) => Err(LifecycleError::Host(format!("claim refused: {}", reason))),
            None => Ok(()),
        }
    }
}
