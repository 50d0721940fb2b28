//! Daemon probe.
//!
//! Connects to a node daemon, registers, pings, and lists the harvester's
//! plots. With `--watch` it also asks for a plot refresh and logs
//! `state_changed` pushes until the daemon hangs up or Ctrl-C.
//!
//! Run against the mock daemon:
//!   cargo run -p daemonlink-mock-daemon
//!   cargo run -p daemonlink-probe -- --watch

mod args;

use args::Args;
use clap::Parser;
use daemonlink_client::services::{Daemon, Harvester};
use daemonlink_client::{Connection, StateChanged};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("probe=info".parse()?)
                .add_directive("daemonlink_client=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let config = args.config()?;

    tracing::info!("Connecting to {} as {}", config.url, config.origin);
    let connection = Connection::connect(&config).await?;
    let daemon = Daemon::new(&connection);
    let harvester = Harvester::new(&connection);

    daemon.register_service(connection.origin()).await?;
    let pong = daemon.service().ping().await?;
    tracing::info!("Daemon answered ping: {}", pong);

    let plots = harvester.get_plots().await?;
    println!("{} plots", plots.plots.len());
    for plot in &plots.plots {
        match plot.size {
            Some(k) => println!("  k{k}  {}", plot.filename),
            None => println!("  ?    {}", plot.filename),
        }
    }
    for missing in &plots.not_found_filenames {
        println!("  missing  {missing}");
    }

    if !args.watch {
        connection.close();
        return Ok(());
    }

    harvester
        .service()
        .on_notification(|change: StateChanged, message| {
            tracing::info!("{} state changed: {}", message.origin(), change.state);
        })
        .detach();
    harvester.refresh_plots().await?;

    tokio::select! {
        _ = connection.closed() => tracing::info!("Daemon closed the connection"),
        _ = tokio::signal::ctrl_c() => connection.close(),
    }
    Ok(())
}
