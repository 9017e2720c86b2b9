//! Cross-context messaging for the edge request-interception layer.
//!
//! This crate provides:
//! - `BroadcastChannel` - Named publish/subscribe channel shared with other contexts
//! - `LocalBroadcastChannel` - In-process channel backed by `tokio::sync::broadcast`
//! - `OutboundMessage` / `InboundReply` - Wire format of forwarded requests and replies
//! - `BroadcastCorrelator` - Forwards a request and waits for the reply carrying its id

mod channel;
mod correlator;
mod message;

pub use channel::*;
pub use correlator::*;
pub use message::*;
