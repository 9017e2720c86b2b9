//! Named publish/subscribe channel.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;

/// Channel errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ChannelError {
    #[error("channel '{0}' is closed")]
    Closed(String),
}

/// A named fan-out channel shared between execution contexts.
///
/// Every subscriber sees every message posted by another handle and must
/// filter for the messages it cares about. A handle never receives its own
/// posts.
pub trait BroadcastChannel: Send + Sync {
    /// Channel name.
    fn name(&self) -> &str;

    /// Publish a message to every other subscriber.
    fn post(&self, message: &Value) -> Result<(), ChannelError>;

    /// Subscribe to messages posted from now on.
    fn subscribe(&self) -> BoxStream<'static, Value>;
}

#[derive(Debug)]
struct Subscriber {
    owner: u64,
    tx: mpsc::UnboundedSender<Value>,
}

#[derive(Debug)]
struct Hub {
    name: String,
    subscribers: Mutex<Vec<Subscriber>>,
    closed: AtomicBool,
    next_id: AtomicU64,
}

/// In-process broadcast channel.
///
/// Each subscription owns an unbounded queue, so a slow subscriber never
/// loses messages. Handles created with [`LocalBroadcastChannel::handle`]
/// stand in for other contexts (a page, another worker) connected to the
/// same channel name.
#[derive(Debug, Clone)]
pub struct LocalBroadcastChannel {
    hub: Arc<Hub>,
    id: u64,
}

impl LocalBroadcastChannel {
    /// Open a new channel.
    pub fn open(name: impl Into<String>) -> Self {
        Self {
            hub: Arc::new(Hub {
                name: name.into(),
                subscribers: Mutex::new(Vec::new()),
                closed: AtomicBool::new(false),
                next_id: AtomicU64::new(1),
            }),
            id: 0,
        }
    }

    /// Another handle on the same channel.
    pub fn handle(&self) -> Self {
        Self {
            hub: self.hub.clone(),
            id: self.hub.next_id.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Number of live subscriptions across all handles.
    pub fn subscriber_count(&self) -> usize {
        self.hub
            .subscribers
            .lock()
            .iter()
            .filter(|sub| !sub.tx.is_closed())
            .count()
    }

    /// Close the channel for every handle. Open subscriptions end after
    /// draining what was already posted, and later posts fail.
    pub fn close(&self) {
        self.hub.closed.store(true, Ordering::SeqCst);
        self.hub.subscribers.lock().clear();
        tracing::debug!(channel = %self.hub.name, "broadcast channel closed");
    }

    pub fn is_closed(&self) -> bool {
        self.hub.closed.load(Ordering::SeqCst)
    }
}

impl BroadcastChannel for LocalBroadcastChannel {
    fn name(&self) -> &str {
        &self.hub.name
    }

    fn post(&self, message: &Value) -> Result<(), ChannelError> {
        if self.is_closed() {
            return Err(ChannelError::Closed(self.hub.name.clone()));
        }

        let mut subscribers = self.hub.subscribers.lock();
        subscribers.retain(|sub| !sub.tx.is_closed());
        for sub in subscribers.iter().filter(|sub| sub.owner != self.id) {
            // Only fails if the receiver was dropped after the retain above.
            let _ = sub.tx.send(message.clone());
        }
        Ok(())
    }

    fn subscribe(&self) -> BoxStream<'static, Value> {
        if self.is_closed() {
            return stream::empty().boxed();
        }

        let (tx, rx) = mpsc::unbounded_channel();
        self.hub.subscribers.lock().push(Subscriber { owner: self.id, tx });

        stream::unfold(rx, |mut rx| async move {
            let message = rx.recv().await?;
            Some((message, rx))
        })
        .boxed()
    }
}
