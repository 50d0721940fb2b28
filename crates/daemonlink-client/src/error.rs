//! Failures a request can end in, from local misuse to daemon-reported errors.

use daemonlink_core::CodecError;
use serde_json::Value;
use std::time::Duration;

/// Errors surfaced to callers of [`Connection::send`](crate::Connection::send)
/// and [`Service::command`](crate::Service::command).
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("command name cannot be empty")]
    EmptyCommand,
    #[error("request id {0} is already in flight")]
    DuplicateRequestId(String),
    #[error("connection closed")]
    ConnectionClosed,
    #[error("request {request_id} timed out after {timeout:?}")]
    Timeout {
        request_id: String,
        timeout: Duration,
    },
    /// The daemon answered but reported failure.
    #[error("daemon rejected request: {message}")]
    Daemon { message: String, data: Value },
    #[error("websocket error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("unexpected response payload: {0}")]
    Payload(#[source] serde_json::Error),
}

impl ClientError {
    /// Inspect a correlated response for the daemon's failure markers:
    /// an `error` string or `success: false`.
    pub(crate) fn from_response(data: &Value) -> Option<Self> {
        if let Some(message) = data.get("error").and_then(Value::as_str) {
            return Some(Self::Daemon {
                message: message.to_string(),
                data: data.clone(),
            });
        }
        if data.get("success") == Some(&Value::Bool(false)) {
            return Some(Self::Daemon {
                message: "request failed".to_string(),
                data: data.clone(),
            });
        }
        None
    }
}
