//! Inbound live-feed message envelope.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::str::FromStr;
use thiserror::Error;

/// Field names accepted as the message discriminator, in lookup order.
pub const DISCRIMINATOR_FIELDS: [&str; 2] = ["action", "kind"];

/// Errors produced while parsing an inbound frame.
///
/// These never leave the supervisor; a frame that fails to parse is dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessageParseError {
    #[error("Frame is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("Frame is not a JSON object")]
    NotAnObject,

    #[error("Frame has no string 'action' or 'kind' field")]
    MissingDiscriminator,

    #[error("Payload does not match expected shape: {0}")]
    PayloadMismatch(String),
}

/// A tagged `{action|kind, ...payload}` object received on a live feed.
///
/// The full object, discriminator included, is kept verbatim so listeners
/// see exactly what the server sent.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    kind: String,
    body: Map<String, Value>,
}

impl InboundMessage {
    /// Parses a text frame into the envelope.
    pub fn parse(text: &str) -> Result<Self, MessageParseError> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| MessageParseError::InvalidJson(e.to_string()))?;
        Self::from_value(value)
    }

    /// Wraps an already-decoded JSON value.
    pub fn from_value(value: Value) -> Result<Self, MessageParseError> {
        let Value::Object(body) = value else {
            return Err(MessageParseError::NotAnObject);
        };
        let kind = DISCRIMINATOR_FIELDS
            .iter()
            .find_map(|field| body.get(*field).and_then(Value::as_str))
            .ok_or(MessageParseError::MissingDiscriminator)?
            .to_string();
        Ok(Self { kind, body })
    }

    /// The discriminator value, e.g. `update_live_count`.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Looks up one payload field.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.body.get(field)
    }

    /// The whole object as received.
    pub fn body(&self) -> &Map<String, Value> {
        &self.body
    }

    /// The whole object as a JSON value.
    pub fn to_value(&self) -> Value {
        Value::Object(self.body.clone())
    }

    /// Deserializes the object into a feed-specific payload type.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, MessageParseError> {
        serde_json::from_value(self.to_value())
            .map_err(|e| MessageParseError::PayloadMismatch(e.to_string()))
    }
}

impl FromStr for InboundMessage {
    type Err = MessageParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
