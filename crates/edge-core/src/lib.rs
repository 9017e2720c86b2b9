//! Core types for the edge request-interception layer.
//!
//! This crate provides the fundamental types shared by every component:
//! - `InterceptedRequest` - An immutable view of a request seen by the router
//! - `Response` - HTTP-shaped response with a shareable body
//! - `RuntimeConfig` / `WorkerConfig` - Activation-time and deploy-time configuration
//! - `RequestId` - Per-request identifier for log correlation
//! - `WaitUntil` - Deferred completion handle for background work
//! - `WorkerState` - Worker lifecycle states

mod config;
mod context;
mod lifecycle;
mod request;
mod response;

pub use config::*;
pub use context::*;
pub use lifecycle::*;
pub use request::*;
pub use response::*;
