//! Network fetch primitive for the edge request-interception layer.
//!
//! This crate provides:
//! - `Fetcher` - Request in, response or failure out
//! - `StubFetcher` - In-process fetcher for development and tests
//! - `SpinFetcher` - Outbound HTTP through Spin (wasm32 only)

mod client;
mod stub;

pub use client::*;
pub use stub::*;
