use clap::Parser;
use daemonlink_client::{ClientConfig, ServiceName};
use std::path::PathBuf;
use std::time::Duration;

/// Command-line flags. Each one overrides the matching config-file value.
#[derive(Debug, Parser)]
#[command(about = "Probe a node daemon over its WebSocket API")]
pub struct Args {
    /// TOML config file.
    #[arg(long, env = "DAEMONLINK_CONFIG")]
    pub config: Option<PathBuf>,
    #[arg(long, env = "DAEMONLINK_URL")]
    pub url: Option<String>,
    #[arg(long)]
    pub origin: Option<ServiceName>,
    /// Request timeout in milliseconds; 0 waits forever.
    #[arg(long)]
    pub timeout_ms: Option<u64>,
    /// Refresh plots and log state changes until interrupted.
    #[arg(long)]
    pub watch: bool,
}

impl Args {
    pub fn config(&self) -> anyhow::Result<ClientConfig> {
        let mut config = match &self.config {
            Some(path) => ClientConfig::load(path)?,
            None => ClientConfig::default(),
        };
        if let Some(url) = &self.url {
            config = config.with_url(url.clone());
        }
        if let Some(origin) = &self.origin {
            config = config.with_origin(origin.clone());
        }
        if let Some(ms) = self.timeout_ms {
            config = config.with_request_timeout((ms > 0).then(|| Duration::from_millis(ms)));
        }
        Ok(config)
    }
}
