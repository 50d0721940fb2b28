//! Typed wrappers over [`Service`](crate::Service) for known endpoints.

mod daemon;
mod harvester;

pub use daemon::{Daemon, IsRunning, KeyringStatus};
pub use harvester::{Harvester, Plot, PlotList};
