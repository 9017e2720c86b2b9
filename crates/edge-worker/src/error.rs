//! Error types for the worker.

use edge_broadcast::ForwardError;
use edge_cache::{CacheAsideError, CacheError};
use edge_core::{ConfigError, WorkerState};
use edge_data::FetchError;
use http::StatusCode;

/// Failure handling an intercepted request.
///
/// The request is left without an interception response; the host falls back
/// to its default network behavior.
#[derive(Debug, thiserror::Error)]
pub enum InterceptError {
    #[error("network fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("cache store failed: {0}")]
    Cache(#[from] CacheError),

    #[error("forwarding failed: {0}")]
    Forward(#[from] ForwardError),
}

impl From<CacheAsideError> for InterceptError {
    fn from(err: CacheAsideError) -> Self {
        match err {
            CacheAsideError::Fetch(e) => Self::Fetch(e),
            CacheAsideError::Cache(e) => Self::Cache(e),
        }
    }
}

/// Failure in an install or activate event.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("cannot {event} while {state}")]
    InvalidState {
        event: &'static str,
        state: WorkerState,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to fetch seed entry: {0}")]
    Seed(#[from] FetchError),

    #[error("seed entry {url} answered {status}")]
    SeedStatus { url: String, status: StatusCode },

    #[error("failed to seed cache: {0}")]
    Cache(#[from] CacheError),

    #[error("host error: {0}")]
    Host(String),
}
