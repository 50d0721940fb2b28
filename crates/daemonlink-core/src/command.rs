//! Command verbs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// The verb carried by a [`Message`](crate::Message).
///
/// Commands the daemon is known to speak get their own variant so that
/// listeners can be keyed on them without string comparisons. Anything else
/// is kept verbatim in [`Command::Other`] and round-trips unchanged.
///
/// Equality and hashing go by the wire name, so `Other("ping")` and
/// `Ping` are the same command.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Command {
    RegisterService,
    StartService,
    StopService,
    IsRunning,
    KeyringStatus,
    SetKeyringPassphrase,
    Exit,
    GetPlots,
    RefreshPlots,
    Ping,
    /// Unsolicited state notification; the new state is in `data.state`.
    StateChanged,
    Other(String),
}

impl Command {
    pub fn as_str(&self) -> &str {
        match self {
            Self::RegisterService => "register_service",
            Self::StartService => "start_service",
            Self::StopService => "stop_service",
            Self::IsRunning => "is_running",
            Self::KeyringStatus => "keyring_status",
            Self::SetKeyringPassphrase => "set_keyring_passphrase",
            Self::Exit => "exit",
            Self::GetPlots => "get_plots",
            Self::RefreshPlots => "refresh_plots",
            Self::Ping => "ping",
            Self::StateChanged => "state_changed",
            Self::Other(name) => name,
        }
    }

    /// True for the empty verb, which is never valid on an outgoing request.
    pub fn is_empty(&self) -> bool {
        self.as_str().is_empty()
    }
}

impl From<&str> for Command {
    fn from(s: &str) -> Self {
        match s {
            "register_service" => Self::RegisterService,
            "start_service" => Self::StartService,
            "stop_service" => Self::StopService,
            "is_running" => Self::IsRunning,
            "keyring_status" => Self::KeyringStatus,
            "set_keyring_passphrase" => Self::SetKeyringPassphrase,
            "exit" => Self::Exit,
            "get_plots" => Self::GetPlots,
            "refresh_plots" => Self::RefreshPlots,
            "ping" => Self::Ping,
            "state_changed" => Self::StateChanged,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for Command {
    fn from(s: String) -> Self {
        match Self::from(s.as_str()) {
            Self::Other(_) => Self::Other(s),
            known => known,
        }
    }
}

impl From<Command> for String {
    fn from(command: Command) -> Self {
        match command {
            Command::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl PartialEq for Command {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for Command {}

impl Hash for Command {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_str().hash(state);
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
