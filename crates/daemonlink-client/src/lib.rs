//! Client-side implementation of the daemon protocol.
//!
//! One [`Connection`] carries every [`Service`] in the process. Services
//! send commands through it and receive the notifications addressed to
//! them; the typed wrappers in [`services`] cover the commands the daemon
//! is known to answer.
//!
//! ```no_run
//! # async fn demo() -> Result<(), daemonlink_client::ClientError> {
//! use daemonlink_client::{ClientConfig, Connection, services::Harvester};
//!
//! let connection = Connection::connect(&ClientConfig::default()).await?;
//! let harvester = Harvester::new(&connection);
//! let plots = harvester.get_plots().await?;
//! println!("{} plots", plots.plots.len());
//! # Ok(())
//! # }
//! ```

mod config;
mod connection;
mod error;
mod listeners;
mod service;
pub mod services;

#[cfg(test)]
mod test_support;

pub use config::{ClientConfig, ConfigError, DEFAULT_REQUEST_TIMEOUT_MS, DEFAULT_URL};
pub use connection::Connection;
pub use daemonlink_core::{
    Command, ConnectionState, Message, Notification, ServiceName, StateChanged,
};
pub use error::ClientError;
pub use listeners::Subscription;
pub use service::Service;

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Registries hold plain data, so a poisoned lock is still consistent.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
