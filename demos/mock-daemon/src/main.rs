//! Stand-in node daemon.
//!
//! Speaks the daemon's WebSocket protocol well enough to drive a client
//! without a real node: service lifecycle, keyring status, and a fixed set
//! of fake plots on the harvester.
//!
//! Run:
//!   cargo run -p daemonlink-mock-daemon -- --port 55400 --plots 5
//!
//! Then point a client at ws://127.0.0.1:55400.

mod handlers;
mod server;

use clap::Parser;
use handlers::DaemonState;
use server::MockDaemon;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(about = "Mock node daemon for exercising daemonlink clients")]
struct Args {
    #[arg(long, env = "MOCK_DAEMON_PORT", default_value_t = 55400)]
    port: u16,
    /// Number of fake plots the harvester reports.
    #[arg(long, default_value_t = 3)]
    plots: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("mock_daemon=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let addr: SocketAddr = ([127, 0, 0, 1], args.port).into();

    tracing::info!("Starting mock daemon on {} with {} plots", addr, args.plots);

    let listener = TcpListener::bind(addr).await?;
    MockDaemon::new(DaemonState::new(args.plots)).serve(listener).await
}
