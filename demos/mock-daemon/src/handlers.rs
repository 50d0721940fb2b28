//! Command handling, independent of the socket.

use daemonlink_core::{Command, Message, ServiceName};
use serde_json::{Value, json};
use std::collections::HashSet;

/// Shared daemon state.
pub struct DaemonState {
    running: HashSet<String>,
    registered: HashSet<String>,
    plots: Vec<Value>,
}

/// What to do after handling one request.
#[derive(Debug, Default)]
pub struct Outcome {
    /// Response payload, sent if the request asked for an ack.
    pub reply: Option<Value>,
    /// Push to broadcast to every connection.
    pub notify: Option<Message>,
    /// Close this connection after replying.
    pub exit: bool,
}

impl DaemonState {
    pub fn new(plot_count: usize) -> Self {
        Self {
            running: HashSet::new(),
            registered: HashSet::new(),
            plots: (0..plot_count).map(fake_plot).collect(),
        }
    }

    pub fn handle(&mut self, request: &Message) -> Outcome {
        let data = request.data();
        let service = data.get("service").and_then(Value::as_str).unwrap_or_default();

        match request.command() {
            Command::Ping => reply(json!({"success": true, "value": "pong"})),
            Command::RegisterService => {
                self.registered.insert(service.to_string());
                tracing::info!("Registered {} ({} clients)", service, self.registered.len());
                reply(json!({"success": true}))
            }
            Command::StartService => {
                if !self.running.insert(service.to_string()) {
                    return reply(failure(format!("{service} already running")));
                }
                tracing::info!("Started {}", service);
                reply(json!({"success": true, "service": service}))
            }
            Command::StopService => {
                if !self.running.remove(service) {
                    return reply(failure(format!("{service} is not running")));
                }
                tracing::info!("Stopped {}", service);
                reply(json!({"success": true, "service_name": service}))
            }
            Command::IsRunning => reply(json!({
                "success": true,
                "service_name": service,
                "is_running": self.running.contains(service),
            })),
            Command::KeyringStatus => reply(json!({
                "success": true,
                "is_keyring_locked": false,
                "passphrase_support_enabled": true,
                "can_save_passphrase": true,
                "user_passphrase_is_set": false,
                "needs_migration": false,
                "passphrase_hint": null,
            })),
            Command::SetKeyringPassphrase => {
                let new = data.get("new_passphrase").and_then(Value::as_str);
                match new {
                    Some(new) if !new.is_empty() => reply(json!({"success": true})),
                    _ => reply(failure("new_passphrase is required".to_string())),
                }
            }
            Command::GetPlots => reply(json!({
                "success": true,
                "plots": self.plots,
                "failed_to_open_filenames": [],
                "not_found_filenames": [],
            })),
            Command::RefreshPlots => {
                let notify = Message::new(
                    ServiceName::HARVESTER.as_str(),
                    ServiceName::HARVESTER.as_str(),
                    Command::StateChanged,
                    json!({"state": "plots_refreshed", "count": self.plots.len()}),
                );
                Outcome {
                    reply: Some(json!({"success": true})),
                    notify: Some(notify),
                    exit: false,
                }
            }
            Command::Exit => Outcome {
                reply: Some(json!({"success": true})),
                notify: None,
                exit: true,
            },
            other => reply(failure(format!("unknown command {other}"))),
        }
    }
}

fn reply(data: Value) -> Outcome {
    Outcome {
        reply: Some(data),
        ..Outcome::default()
    }
}

fn failure(error: String) -> Value {
    json!({"success": false, "error": error})
}

fn fake_plot(index: usize) -> Value {
    json!({
        "filename": format!("/plots/plot-k32-{index:04}.plot"),
        "size": 32,
        "plot_id": format!("{index:064x}"),
        "file_size": 108_837_999_104_u64,
    })
}
