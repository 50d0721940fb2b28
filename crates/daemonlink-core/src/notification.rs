//! Typed payloads for unsolicited daemon pushes.

use crate::Command;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A payload type bound to the command that carries it.
///
/// Listeners subscribed through a typed API receive the payload already
/// deserialized, so each command has exactly one payload shape.
pub trait Notification: DeserializeOwned + Send + 'static {
    const COMMAND: Command;
}

/// Payload of a `state_changed` push.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateChanged {
    pub state: String,
    /// Remaining payload fields, which vary by state.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Notification for StateChanged {
    const COMMAND: Command = Command::StateChanged;
}
