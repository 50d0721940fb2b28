//! The harvester's plot inventory.

use crate::{ClientError, Command, Connection, Service, ServiceName};
use serde::Deserialize;
use serde_json::{Map, Value, json};

/// Typed calls on the `harvester` service.
#[derive(Debug, Clone)]
pub struct Harvester {
    service: Service,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct PlotList {
    pub plots: Vec<Plot>,
    pub failed_to_open_filenames: Vec<String>,
    pub not_found_filenames: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Plot {
    pub filename: String,
    /// The k parameter.
    #[serde(default)]
    pub size: Option<u8>,
    #[serde(default)]
    pub plot_id: Option<String>,
    #[serde(default)]
    pub file_size: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Harvester {
    pub fn new(connection: &Connection) -> Self {
        Self {
            service: Service::new(connection, ServiceName::HARVESTER),
        }
    }

    pub fn service(&self) -> &Service {
        &self.service
    }

    pub async fn get_plots(&self) -> Result<PlotList, ClientError> {
        self.service.call(Command::GetPlots, json!({})).await
    }

    /// Rescan plot directories. Completion is announced by a
    /// `state_changed` push.
    pub async fn refresh_plots(&self) -> Result<(), ClientError> {
        self.service
            .command(Command::RefreshPlots, json!({}), true)
            .await?;
        Ok(())
    }
}
