//! Request interception for the edge platform.
//!
//! This crate provides:
//! - `classify` / `FetchRouter` - Ordered routing rules and handler dispatch
//! - `ServiceWorker` - Install, activate and intercept lifecycle
//! - `WorkerHost` - Host operations the lifecycle depends on
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use edge_broadcast::LocalBroadcastChannel;
//! use edge_cache::InMemoryCacheStore;
//! use edge_core::{InterceptedRequest, WorkerConfig};
//! use edge_worker::{FetchEvent, LocalHost, ServiceWorker};
//!
//! let config = WorkerConfig::load("worker.toml")?;
//! let worker = ServiceWorker::new(
//!     config.clone(),
//!     &scope,
//!     Arc::new(InMemoryCacheStore::open(&config.cache_name)),
//!     Arc::new(fetcher),
//!     Arc::new(LocalBroadcastChannel::open(&config.channel_name)),
//!     Arc::new(LocalHost::new()),
//! );
//!
//! worker.install().await?;
//! worker.activate(&activation_url).await?;
//!
//! let event = FetchEvent::new(request);
//! if let Some(response) = worker.handle_fetch(&event).await? {
//!     // respond with `response`
//! }
//! event.wait_until().settled().await;
//! ```

mod error;
mod host;
mod markers;
mod router;
mod worker;

pub use error::*;
pub use host::*;
pub use markers::*;
pub use router::*;
pub use worker::*;
