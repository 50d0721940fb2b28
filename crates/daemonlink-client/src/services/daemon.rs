//! The daemon's own control endpoint.

use crate::{ClientError, Command, Connection, Service, ServiceName};
use serde::Deserialize;
use serde_json::{Value, json};

/// Commands handled by the daemon process itself: service lifecycle and
/// keyring management.
#[derive(Debug, Clone)]
pub struct Daemon {
    service: Service,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IsRunning {
    pub service_name: ServiceName,
    pub is_running: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct KeyringStatus {
    pub is_keyring_locked: bool,
    pub passphrase_support_enabled: bool,
    pub can_save_passphrase: bool,
    pub user_passphrase_is_set: bool,
    pub needs_migration: bool,
    pub passphrase_hint: Option<String>,
}

impl Daemon {
    pub fn new(connection: &Connection) -> Self {
        Self {
            service: Service::new(connection, ServiceName::DAEMON),
        }
    }

    pub fn service(&self) -> &Service {
        &self.service
    }

    /// Announce `name` to the daemon so pushes for it are routed here.
    pub async fn register_service(&self, name: &ServiceName) -> Result<Value, ClientError> {
        self.service
            .command(Command::RegisterService, json!({ "service": name }), true)
            .await
    }

    pub async fn start_service(
        &self,
        name: &ServiceName,
        testing: bool,
    ) -> Result<Value, ClientError> {
        self.service
            .command(
                Command::StartService,
                json!({ "service": name, "testing": testing }),
                true,
            )
            .await
    }

    pub async fn stop_service(&self, name: &ServiceName) -> Result<Value, ClientError> {
        self.service
            .command(Command::StopService, json!({ "service": name }), true)
            .await
    }

    pub async fn is_running(&self, name: &ServiceName) -> Result<bool, ClientError> {
        let status: IsRunning = self
            .service
            .call(Command::IsRunning, json!({ "service": name }))
            .await?;
        Ok(status.is_running)
    }

    pub async fn keyring_status(&self) -> Result<KeyringStatus, ClientError> {
        self.service.call(Command::KeyringStatus, json!({})).await
    }

    pub async fn set_keyring_passphrase(
        &self,
        current: Option<&str>,
        new: &str,
        hint: Option<&str>,
        save: bool,
    ) -> Result<(), ClientError> {
        self.service
            .command(
                Command::SetKeyringPassphrase,
                json!({
                    "current_passphrase": current,
                    "new_passphrase": new,
                    "passphrase_hint": hint,
                    "save_passphrase": save,
                }),
                true,
            )
            .await?;
        Ok(())
    }

    /// Ask the daemon to shut down. The socket closes shortly after, so no
    /// response is awaited.
    pub async fn exit(&self) -> Result<(), ClientError> {
        self.service.command(Command::Exit, json!({}), false).await?;
        Ok(())
    }
}
