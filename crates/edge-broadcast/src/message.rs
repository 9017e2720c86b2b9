//! Wire format of forwarded requests and their replies.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// JSON field carrying the correlation id.
pub const CORRELATION_FIELD: &str = "browsingContextId";

/// JSON field carrying the request pathname in outbound messages.
pub const PATHNAME_FIELD: &str = "pathname";

/// Opaque correlation id, keyed by its JSON text.
///
/// The id is under the caller's control and may be any JSON value, so the
/// string `"1"` and the number `1` are different ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Id for a JSON value.
    pub fn from_value(value: &Value) -> Self {
        Self(value.to_string())
    }

    /// JSON text of the id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Why a request body could not be turned into an outbound message.
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    #[error("request has no body")]
    MissingBody,

    #[error("body is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("body is not a JSON object")]
    NotAnObject,

    #[error("body has no `browsingContextId`")]
    MissingCorrelationId,
}

/// Message published to other contexts for a forwarded request.
///
/// Serializes as `{ "browsingContextId": .., "pathname": .., ...fields }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundMessage {
    pub browsing_context_id: Value,
    pub pathname: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl OutboundMessage {
    /// Build a message from a request body and the request pathname.
    ///
    /// A `pathname` field in the body is replaced by `pathname`.
    pub fn from_body(body: Option<&[u8]>, pathname: &str) -> Result<Self, EnvelopeError> {
        let body = body.ok_or(EnvelopeError::MissingBody)?;
        let Value::Object(mut fields) = serde_json::from_slice::<Value>(body)? else {
            return Err(EnvelopeError::NotAnObject);
        };

        let browsing_context_id = fields
            .remove(CORRELATION_FIELD)
            .ok_or(EnvelopeError::MissingCorrelationId)?;
        fields.remove(PATHNAME_FIELD);

        Ok(Self {
            browsing_context_id,
            pathname: pathname.to_string(),
            fields,
        })
    }

    pub fn correlation_id(&self) -> CorrelationId {
        CorrelationId::from_value(&self.browsing_context_id)
    }
}

/// Reply published by another context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundReply {
    pub browsing_context_id: Value,
    pub response: Value,
}

impl InboundReply {
    /// Parse a channel message as a reply. Messages of any other shape yield
    /// `None`.
    pub fn parse(message: Value) -> Option<Self> {
        serde_json::from_value(message).ok()
    }

    pub fn correlation_id(&self) -> CorrelationId {
        CorrelationId::from_value(&self.browsing_context_id)
    }
}
