//! The wire envelope.
//!
//! Requests, responses and notifications all travel as a [`Message`]
//! encoded as a single JSON text frame:
//!
//! ```json
//! { "origin": "wallet_ui", "destination": "harvester", "command": "get_plots",
//!   "data": {}, "ack": true, "request_id": "9f0c..." }
//! ```
//!
//! `ack` and `request_id` may be absent on notifications; `data` defaults
//! to an empty object.

use crate::Command;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One unit of communication between a client and the daemon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    origin: String,
    destination: String,
    command: Command,
    #[serde(default = "empty_object")]
    data: Value,
    #[serde(default)]
    ack: bool,
    #[serde(
        default,
        alias = "requestId",
        skip_serializing_if = "Option::is_none"
    )]
    request_id: Option<String>,
}

fn empty_object() -> Value {
    Value::Object(Default::default())
}

impl Message {
    /// Create a fire-and-forget message without a correlation id.
    pub fn new(
        origin: impl Into<String>,
        destination: impl Into<String>,
        command: impl Into<Command>,
        data: Value,
    ) -> Self {
        Self {
            origin: origin.into(),
            destination: destination.into(),
            command: command.into(),
            data,
            ack: false,
            request_id: None,
        }
    }

    /// Set whether a correlated response is expected.
    pub fn with_ack(mut self, ack: bool) -> Self {
        self.ack = ack;
        self
    }

    /// Use a caller-chosen correlation id instead of a generated one.
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Build the response to this message: endpoints swapped, same command
    /// and correlation id.
    pub fn reply(&self, data: Value) -> Self {
        Self {
            origin: self.destination.clone(),
            destination: self.origin.clone(),
            command: self.command.clone(),
            data,
            ack: true,
            request_id: self.request_id.clone(),
        }
    }

    /// Name of the sending service.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Name of the service the message is addressed to.
    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// The verb.
    pub fn command(&self) -> &Command {
        &self.command
    }

    /// Command payload. Defaults to `{}` when absent on the wire.
    pub fn data(&self) -> &Value {
        &self.data
    }

    /// Take the payload, dropping the envelope.
    pub fn into_data(self) -> Value {
        self.data
    }

    /// Whether the message expects, or is, a correlated response.
    pub fn ack(&self) -> bool {
        self.ack
    }

    /// Correlation id, if one has been assigned.
    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    /// Encode as a JSON text frame.
    pub fn encode(&self) -> Result<String, CodecError> {
        serde_json::to_string(self).map_err(CodecError::Encode)
    }

    /// Decode a JSON text frame.
    pub fn decode(frame: &str) -> Result<Self, CodecError> {
        serde_json::from_str(frame).map_err(CodecError::Decode)
    }
}

/// Error converting a [`Message`] to or from its wire form.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("malformed message frame: {0}")]
    Decode(#[source] serde_json::Error),
}
