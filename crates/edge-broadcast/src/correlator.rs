//! Request forwarding with reply correlation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use edge_core::{InterceptedRequest, Response};
use futures::stream::BoxStream;
use futures::StreamExt;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::channel::{BroadcastChannel, ChannelError};
use crate::message::{CorrelationId, EnvelopeError, InboundReply, OutboundMessage};

type PendingMap = Arc<Mutex<HashMap<CorrelationId, oneshot::Sender<Value>>>>;

/// Forwarding errors.
#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    /// The request body is not a usable outbound message.
    #[error("malformed forward body: {0}")]
    MalformedBody(#[from] EnvelopeError),

    /// A forward with the same id is already waiting for its reply.
    #[error("correlation id {0} is already in flight")]
    DuplicateCorrelationId(CorrelationId),

    /// No reply arrived within the configured wait.
    #[error("no reply for correlation id {id} within {after:?}")]
    TimedOut { id: CorrelationId, after: Duration },

    /// The correlator stopped listening before a reply arrived.
    #[error("correlator stopped before a reply for {0} arrived")]
    Closed(CorrelationId),

    #[error(transparent)]
    Channel(#[from] ChannelError),

    /// The reply could not be encoded as a response body.
    #[error("failed to encode reply: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Forwards requests over a broadcast channel and resolves each one when a
/// reply with the same correlation id arrives.
///
/// A single dispatcher task reads the channel and hands each reply to the
/// forward waiting on its id. Replies for ids nobody is waiting on are
/// dropped. Pending entries are removed when their reply arrives, when the
/// wait times out and when the waiting future is dropped.
///
/// Must be created inside a tokio runtime.
pub struct BroadcastCorrelator<C> {
    channel: Arc<C>,
    pending: PendingMap,
    reply_timeout: Option<Duration>,
    dispatcher: JoinHandle<()>,
}

impl<C: BroadcastChannel + 'static> BroadcastCorrelator<C> {
    /// Start listening on `channel`. With `reply_timeout` set to `None`,
    /// forwards wait for their reply indefinitely.
    pub fn new(channel: Arc<C>, reply_timeout: Option<Duration>) -> Self {
        let pending = PendingMap::default();
        // Subscribe before any forward can publish.
        let replies = channel.subscribe();
        let dispatcher = tokio::spawn(dispatch(
            channel.name().to_string(),
            replies,
            pending.clone(),
        ));

        Self {
            channel,
            pending,
            reply_timeout,
            dispatcher,
        }
    }

    /// The channel forwards are published on.
    pub fn channel(&self) -> &Arc<C> {
        &self.channel
    }

    pub fn reply_timeout(&self) -> Option<Duration> {
        self.reply_timeout
    }

    /// Number of forwards waiting for a reply.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Forward a request and wait for its reply.
    ///
    /// The request body must be a JSON object carrying `browsingContextId`.
    /// The reply's `response` field is returned JSON-encoded in a 200
    /// response.
    pub async fn forward(&self, request: &InterceptedRequest) -> Result<Response, ForwardError> {
        let message = OutboundMessage::from_body(request.body().map(|b| &b[..]), request.pathname())?;
        let id = message.correlation_id();
        let payload = serde_json::to_value(&message).map_err(ForwardError::Encode)?;

        let mut reply = self.register(id.clone())?;
        self.channel.post(&payload)?;
        tracing::debug!(
            channel = %self.channel.name(),
            correlation_id = %id,
            pathname = %message.pathname,
            "forwarded request, awaiting reply"
        );

        let value = match self.reply_timeout {
            Some(after) => match tokio::time::timeout(after, &mut reply.rx).await {
                Ok(received) => received.map_err(|_| ForwardError::Closed(id.clone()))?,
                Err(_) => {
                    tracing::warn!(correlation_id = %id, ?after, "forward timed out");
                    return Err(ForwardError::TimedOut { id, after });
                }
            },
            None => (&mut reply.rx)
                .await
                .map_err(|_| ForwardError::Closed(id.clone()))?,
        };

        Response::json(&value).map_err(ForwardError::Encode)
    }

    fn register(&self, id: CorrelationId) -> Result<PendingReply, ForwardError> {
        let (tx, rx) = oneshot::channel();
        let mut pending = self.pending.lock();
        if pending.contains_key(&id) {
            return Err(ForwardError::DuplicateCorrelationId(id));
        }
        pending.insert(id.clone(), tx);
        Ok(PendingReply {
            id,
            rx,
            pending: self.pending.clone(),
        })
    }
}

impl<C> Drop for BroadcastCorrelator<C> {
    fn drop(&mut self) {
        self.dispatcher.abort();
    }
}

/// Receiving end of one pending forward. Dropping it removes the entry if it
/// is still registered.
struct PendingReply {
    id: CorrelationId,
    rx: oneshot::Receiver<Value>,
    pending: PendingMap,
}

impl Drop for PendingReply {
    fn drop(&mut self) {
        self.rx.close();
        let mut pending = self.pending.lock();
        // Only remove our own sender; the id may have been reused since.
        if pending.get(&self.id).is_some_and(|tx| tx.is_closed()) {
            pending.remove(&self.id);
        }
    }
}

async fn dispatch(channel: String, mut messages: BoxStream<'static, Value>, pending: PendingMap) {
    while let Some(message) = messages.next().await {
        let Some(reply) = InboundReply::parse(message) else {
            tracing::trace!(channel = %channel, "ignoring non-reply message");
            continue;
        };

        let id = reply.correlation_id();
        let waiter = pending.lock().remove(&id);
        match waiter {
            Some(tx) => {
                if tx.send(reply.response).is_err() {
                    tracing::debug!(correlation_id = %id, "reply arrived after forward was dropped");
                }
            }
            None => {
                tracing::trace!(correlation_id = %id, "ignoring reply with no pending forward");
            }
        }
    }
    // Dropping the senders fails every waiting forward with `Closed`.
    let abandoned = std::mem::take(&mut *pending.lock());
    tracing::debug!(
        channel = %channel,
        abandoned = abandoned.len(),
        "broadcast channel closed, dispatcher stopping"
    );
}
