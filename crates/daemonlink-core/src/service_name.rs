//! Names of daemon endpoints.
//!
//! Every message is addressed to a service by name (`daemon`, `harvester`,
//! ...). A name is a single non-empty token; whitespace is rejected so that
//! names survive being used as routing keys and in log fields.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

/// A validated service name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ServiceName(Cow<'static, str>);

impl ServiceName {
    pub const DAEMON: Self = Self::from_static("daemon");
    pub const FULL_NODE: Self = Self::from_static("full_node");
    pub const WALLET: Self = Self::from_static("wallet");
    pub const FARMER: Self = Self::from_static("farmer");
    pub const HARVESTER: Self = Self::from_static("harvester");
    pub const PLOTTER: Self = Self::from_static("plotter");
    pub const TIMELORD: Self = Self::from_static("timelord");
    pub const INTRODUCER: Self = Self::from_static("introducer");
    pub const SIMULATOR: Self = Self::from_static("simulator");
    /// Default origin used by graphical clients.
    pub const WALLET_UI: Self = Self::from_static("wallet_ui");

    const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    /// Validate and wrap a service name.
    pub fn new(name: impl Into<String>) -> Result<Self, ServiceNameError> {
        let name = name.into();
        if name.is_empty() {
            return Err(ServiceNameError::Empty);
        }
        if name.chars().any(char::is_whitespace) {
            return Err(ServiceNameError::Whitespace(name));
        }
        Ok(Self(Cow::Owned(name)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ServiceName {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ServiceName {
    type Err = ServiceNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ServiceName {
    type Error = ServiceNameError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<ServiceName> for String {
    fn from(name: ServiceName) -> Self {
        name.0.into_owned()
    }
}

impl PartialEq<str> for ServiceName {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

/// Error validating a service name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceNameError {
    #[error("service name cannot be empty")]
    Empty,
    #[error("service name cannot contain whitespace, got: {0:?}")]
    Whitespace(String),
}
