//! Caching for the edge request-interception layer.
//!
//! This crate provides:
//! - `CacheStore` - Named cache namespace addressed by request identity
//! - `RequestKey` - Request identity (method + URL)
//! - `IsolationHeaders` - Cross-origin isolation header rewriting
//! - `CacheAsideFetcher` - Stale-while-revalidate serving
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use edge_cache::{CacheAsideFetcher, InMemoryCacheStore, IsolationHeaders};
//! use edge_core::{RuntimeConfig, WaitUntil};
//!
//! let store = Arc::new(InMemoryCacheStore::open("edge-offline-v1"));
//! let swr = CacheAsideFetcher::new(store, fetcher, RuntimeConfig::new(true))
//!     .with_isolation(IsolationHeaders::new("widget.mjs"));
//!
//! let wait_until = WaitUntil::new();
//! let served = swr.serve(&request, &wait_until).await?;
//! wait_until.settled().await;
//! ```

mod headers;
mod key;
mod store;
mod swr;

pub use headers::*;
pub use key::*;
pub use store::*;
pub use swr::*;
