//! Core types for daemonlink.
//!
//! This crate provides the wire envelope spoken between a node daemon and
//! its clients. Transport, correlation and dispatch live in
//! `daemonlink-client`.

mod command;
mod message;
mod notification;
mod service_name;

pub use command::Command;
pub use message::{CodecError, Message};
pub use notification::{Notification, StateChanged};
pub use service_name::{ServiceName, ServiceNameError};

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Transport is up and frames are flowing.
    Open,
    /// Transport closed or failed; no further frames will be exchanged.
    Closed,
}
