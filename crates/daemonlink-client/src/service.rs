//! Named endpoints on a shared connection.

use crate::listeners::{Handler, Listeners, Subscription};
use crate::{ClientError, Connection, lock};
use daemonlink_core::{Command, Message, Notification, ServiceName};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// The part of a service the connection keeps for inbound dispatch.
pub(crate) struct ServiceShared {
    destination: ServiceName,
    registered: AtomicBool,
    listeners: Arc<Mutex<Listeners>>,
}

impl ServiceShared {
    fn new(destination: ServiceName) -> Self {
        Self {
            destination,
            registered: AtomicBool::new(false),
            listeners: Arc::new(Mutex::new(Listeners::default())),
        }
    }

    /// Handle a message the connection did not match to a pending request.
    pub(crate) fn process_message(&self, message: &Message) {
        if message.destination() != self.destination.as_str() {
            tracing::trace!(
                service = %self.destination,
                destination = message.destination(),
                "ignoring message for another service"
            );
            return;
        }

        let command = message.command();
        if *command == Command::RegisterService && !self.registered.swap(true, Ordering::AcqRel) {
            tracing::debug!(service = %self.destination, "service registered");
        }
        if command.is_empty() {
            return;
        }

        let handlers = lock(&self.listeners).handlers(command);
        for handler in handlers {
            handler(message.data(), message);
        }
    }

    fn subscribe(&self, command: Command, handler: Handler) -> Subscription {
        let id = lock(&self.listeners).add(command.clone(), handler);
        Subscription::new(&self.listeners, command, id)
    }
}

/// A named daemon endpoint such as `harvester` or `farmer`.
///
/// Constructing a service registers it with the connection, so
/// notifications addressed to it start flowing immediately. Clones share
/// listeners and registration state.
#[derive(Clone)]
pub struct Service {
    shared: Arc<ServiceShared>,
    origin: ServiceName,
    connection: Connection,
}

impl Service {
    /// Bind `destination` to `connection`, sending as the connection's origin.
    pub fn new(connection: &Connection, destination: ServiceName) -> Self {
        Self::with_origin(connection, destination, connection.origin().clone())
    }

    /// Like [`new`](Self::new), but requests carry `origin` instead of the
    /// connection's own name.
    pub fn with_origin(
        connection: &Connection,
        destination: ServiceName,
        origin: ServiceName,
    ) -> Self {
        let service = Self {
            shared: Arc::new(ServiceShared::new(destination)),
            origin,
            connection: connection.clone(),
        };
        connection.add_service(&service);
        service
    }

    /// The service requests are addressed to and pushes are matched on.
    pub fn destination(&self) -> &ServiceName {
        &self.shared.destination
    }

    /// Sender name stamped on outgoing requests.
    pub fn origin(&self) -> &ServiceName {
        &self.origin
    }

    /// The connection this service sends through.
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Whether a `register_service` command for this service has been seen.
    pub fn is_registered(&self) -> bool {
        self.shared.registered.load(Ordering::Acquire)
    }

    pub(crate) fn shared(&self) -> Arc<ServiceShared> {
        Arc::clone(&self.shared)
    }

    /// Send `command` to this service and return the response payload.
    ///
    /// Without `ack` nothing is awaited and the result is `Value::Null`.
    pub async fn command(
        &self,
        command: impl Into<Command>,
        data: Value,
        ack: bool,
    ) -> Result<Value, ClientError> {
        let command = command.into();
        if command.is_empty() {
            return Err(ClientError::EmptyCommand);
        }
        let message = Message::new(
            self.origin.as_str(),
            self.destination().as_str(),
            command,
            data,
        )
        .with_ack(ack);
        let response = self.connection.send(message).await?;
        Ok(response.map_or(Value::Null, Message::into_data))
    }

    /// Send an acknowledged command and deserialize the response payload.
    pub async fn call<T: DeserializeOwned>(
        &self,
        command: impl Into<Command>,
        data: Value,
    ) -> Result<T, ClientError> {
        let data = self.command(command, data, true).await?;
        serde_json::from_value(data).map_err(ClientError::Payload)
    }

    pub async fn ping(&self) -> Result<Value, ClientError> {
        self.command(Command::Ping, json!({}), true).await
    }

    /// Invoke `callback` with `(data, message)` for every inbound `command`.
    pub fn on_command<F>(&self, command: impl Into<Command>, callback: F) -> Subscription
    where
        F: Fn(&Value, &Message) + Send + Sync + 'static,
    {
        self.shared.subscribe(command.into(), Arc::new(callback))
    }

    /// Like [`on_command`](Self::on_command), passing the payload through
    /// `process_data` first.
    pub fn on_command_with<P, F>(
        &self,
        command: impl Into<Command>,
        process_data: P,
        callback: F,
    ) -> Subscription
    where
        P: Fn(&Value) -> Value + Send + Sync + 'static,
        F: Fn(&Value, &Message) + Send + Sync + 'static,
    {
        self.on_command(command, move |data, message| {
            callback(&process_data(data), message)
        })
    }

    /// Invoke `callback` for `state_changed` pushes whose `data.state`
    /// equals `state`.
    pub fn on_state_changed<F>(&self, state: impl Into<String>, callback: F) -> Subscription
    where
        F: Fn(&Value, &Message) + Send + Sync + 'static,
    {
        let state = state.into();
        self.on_command(Command::StateChanged, move |data, message| {
            if data.get("state").and_then(Value::as_str) == Some(state.as_str()) {
                callback(data, message);
            }
        })
    }

    pub fn on_state_changed_with<P, F>(
        &self,
        state: impl Into<String>,
        process_data: P,
        callback: F,
    ) -> Subscription
    where
        P: Fn(&Value) -> Value + Send + Sync + 'static,
        F: Fn(&Value, &Message) + Send + Sync + 'static,
    {
        self.on_state_changed(state, move |data, message| {
            callback(&process_data(data), message)
        })
    }

    /// Subscribe to `N::COMMAND` with the payload decoded as `N`.
    ///
    /// Payloads that do not decode are logged and skipped.
    pub fn on_notification<N, F>(&self, callback: F) -> Subscription
    where
        N: Notification,
        F: Fn(N, &Message) + Send + Sync + 'static,
    {
        self.on_command(N::COMMAND, move |data, message| {
            match serde_json::from_value::<N>(data.clone()) {
                Ok(payload) => callback(payload, message),
                Err(e) => tracing::warn!(
                    command = %message.command(),
                    error = %e,
                    "ignoring notification with unexpected payload"
                ),
            }
        })
    }
}

impl std::fmt::Debug for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Service")
            .field("destination", &self.shared.destination)
            .field("origin", &self.origin)
            .field("registered", &self.is_registered())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ClientConfig;
    use crate::test_support::{FakeDaemon, pair};
    use daemonlink_core::StateChanged;
    use tokio::sync::oneshot;

    type Seen = Arc<Mutex<Vec<(Value, Message)>>>;

    fn recorder() -> (Seen, impl Fn(&Value, &Message) + Send + Sync + 'static) {
        let seen: Seen = Arc::default();
        let sink = Arc::clone(&seen);
        (seen, move |data: &Value, message: &Message| {
            sink.lock().unwrap().push((data.clone(), message.clone()));
        })
    }

    fn push_to(service: &Service, command: &str, data: Value) -> Message {
        Message::new("daemon", service.destination().as_str(), command, data)
    }

    /// Inbound frames are dispatched in order, so once a marker frame has
    /// been handled everything pushed before it has been too.
    async fn flush(service: &Service, daemon: &mut FakeDaemon) {
        let (tx, rx) = oneshot::channel();
        let tx = Mutex::new(Some(tx));
        let _marker = service.on_command("flush", move |_, _| {
            if let Some(tx) = tx.lock().unwrap().take() {
                let _ = tx.send(());
            }
        });
        daemon.push(&push_to(service, "flush", json!({}))).await;
        rx.await.unwrap();
    }

    #[tokio::test]
    async fn command_returns_response_data_only() {
        let (connection, mut daemon) = pair(ClientConfig::default()).await;
        let harvester = Service::new(&connection, ServiceName::HARVESTER);

        let (plots, ()) = tokio::join!(harvester.command("get_plots", json!({}), true), async {
            let request = daemon.recv().await;
            assert_eq!(request.origin(), "wallet_ui");
            assert_eq!(request.destination(), "harvester");
            assert_eq!(request.command(), &Command::GetPlots);
            let payload = json!([{"filename": "x"}]);
            let response = Message::new("harvester", "client", "get_plots", payload)
                .with_ack(true)
                .with_request_id(request.request_id().unwrap());
            daemon.push(&response).await;
        });

        assert_eq!(plots.unwrap(), json!([{"filename": "x"}]));
    }

    #[tokio::test]
    async fn empty_command_fails_before_writing() {
        let (connection, mut daemon) = pair(ClientConfig::default()).await;
        let harvester = Service::new(&connection, ServiceName::HARVESTER);

        let result = harvester.command("", json!({}), true).await;
        assert!(matches!(result, Err(ClientError::EmptyCommand)));
        daemon.expect_silence().await;
    }

    #[tokio::test]
    async fn ping_and_custom_origin() {
        let (connection, mut daemon) = pair(ClientConfig::default()).await;
        let cli = ServiceName::new("cli").unwrap();
        let farmer = Service::with_origin(&connection, ServiceName::FARMER, cli);
        assert_eq!(farmer.origin(), "cli");
        assert_eq!(farmer.connection().origin(), "wallet_ui");

        let (pong, ()) = tokio::join!(farmer.ping(), async {
            let request = daemon.recv().await;
            assert_eq!(request.command(), &Command::Ping);
            assert_eq!(request.origin(), "cli");
            assert!(request.ack());
            daemon.push(&request.reply(json!({"success": true}))).await;
        });
        assert_eq!(pong.unwrap(), json!({"success": true}));
    }

    #[tokio::test]
    async fn unacknowledged_command_returns_null() {
        let (connection, mut daemon) = pair(ClientConfig::default()).await;
        let daemon_service = Service::new(&connection, ServiceName::DAEMON);

        let result = daemon_service.command(Command::Exit, json!({}), false).await;
        assert_eq!(result.unwrap(), Value::Null);
        assert!(!daemon.recv().await.ack());
    }

    #[tokio::test]
    async fn listeners_receive_only_their_command() {
        let (connection, mut daemon) = pair(ClientConfig::default()).await;
        let harvester = Service::new(&connection, ServiceName::HARVESTER);
        let (foo_a, on_foo_a) = recorder();
        let (foo_b, on_foo_b) = recorder();
        let (bar, on_bar) = recorder();
        let _a = harvester.on_command("foo", on_foo_a);
        let _b = harvester.on_command("foo", on_foo_b);
        let _c = harvester.on_command("bar", on_bar);

        let pushed = push_to(&harvester, "foo", json!({"x": 1}));
        daemon.push(&pushed).await;
        flush(&harvester, &mut daemon).await;

        for seen in [&foo_a, &foo_b] {
            let seen = seen.lock().unwrap();
            assert_eq!(seen.len(), 1);
            assert_eq!(seen[0].0, json!({"x": 1}));
            assert_eq!(seen[0].1, pushed);
        }
        assert!(bar.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unsubscribe_removes_only_that_listener() {
        let (connection, mut daemon) = pair(ClientConfig::default()).await;
        let harvester = Service::new(&connection, ServiceName::HARVESTER);
        let (dropped, on_dropped) = recorder();
        let (kept, on_kept) = recorder();
        let subscription = harvester.on_command("foo", on_dropped);
        let _kept = harvester.on_command("foo", on_kept);

        subscription.unsubscribe();
        daemon.push(&push_to(&harvester, "foo", json!({}))).await;
        flush(&harvester, &mut daemon).await;

        assert!(dropped.lock().unwrap().is_empty());
        assert_eq!(kept.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn state_changed_filters_on_state() {
        let (connection, mut daemon) = pair(ClientConfig::default()).await;
        let farmer = Service::new(&connection, ServiceName::FARMER);
        let (running, on_running) = recorder();
        let _sub = farmer.on_state_changed("running", on_running);

        daemon
            .push(&push_to(&farmer, "state_changed", json!({"state": "stopped"})))
            .await;
        daemon
            .push(&push_to(&farmer, "state_changed", json!({"state": "running"})))
            .await;
        daemon
            .push(&push_to(&farmer, "other", json!({"state": "running"})))
            .await;
        flush(&farmer, &mut daemon).await;

        let running = running.lock().unwrap();
        assert_eq!(running.len(), 1);
        assert_eq!(running[0].0["state"], "running");
    }

    #[tokio::test]
    async fn process_data_transforms_payload() {
        let (connection, mut daemon) = pair(ClientConfig::default()).await;
        let wallet = Service::new(&connection, ServiceName::WALLET);
        let (seen, on_seen) = recorder();
        let (synced, on_synced) = recorder();
        let _a = wallet.on_command_with("balance", |data| data["amount"].clone(), on_seen);
        let _b = wallet.on_state_changed_with("synced", |data| data["height"].clone(), on_synced);

        daemon
            .push(&push_to(&wallet, "balance", json!({"amount": 42})))
            .await;
        daemon
            .push(&push_to(&wallet, "state_changed", json!({"state": "synced", "height": 7})))
            .await;
        flush(&wallet, &mut daemon).await;

        assert_eq!(seen.lock().unwrap()[0].0, json!(42));
        assert_eq!(synced.lock().unwrap()[0].0, json!(7));
    }

    #[tokio::test]
    async fn typed_notifications() {
        let (connection, mut daemon) = pair(ClientConfig::default()).await;
        let harvester = Service::new(&connection, ServiceName::HARVESTER);
        let states: Arc<Mutex<Vec<String>>> = Arc::default();
        let sink = Arc::clone(&states);
        let _sub = harvester.on_notification(move |payload: StateChanged, _| {
            sink.lock().unwrap().push(payload.state);
        });

        daemon
            .push(&push_to(&harvester, "state_changed", json!({"missing": "state"})))
            .await;
        daemon
            .push(&push_to(&harvester, "state_changed", json!({"state": "plots_refreshed"})))
            .await;
        flush(&harvester, &mut daemon).await;

        assert_eq!(*states.lock().unwrap(), vec!["plots_refreshed".to_string()]);
    }

    #[tokio::test]
    async fn register_service_marks_registered() {
        let (connection, mut daemon) = pair(ClientConfig::default()).await;
        let harvester = Service::new(&connection, ServiceName::HARVESTER);
        let (seen, on_seen) = recorder();
        let _sub = harvester.on_command(Command::RegisterService, on_seen);
        assert!(!harvester.is_registered());

        daemon
            .push(&push_to(&harvester, "register_service", json!({})))
            .await;
        flush(&harvester, &mut daemon).await;

        assert!(harvester.is_registered());
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn other_spelling_of_known_verb_still_dispatches() {
        let shared = ServiceShared::new(ServiceName::HARVESTER);
        let (seen, on_seen) = recorder();
        let _sub = shared.subscribe(Command::Other("state_changed".into()), Arc::new(on_seen));

        let push = Message::new("daemon", "harvester", "state_changed", json!({"state": "x"}));
        shared.process_message(&push);

        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn messages_for_other_services_are_ignored() {
        let shared = ServiceShared::new(ServiceName::HARVESTER);
        let (seen, on_seen) = recorder();
        let _sub = shared.subscribe(Command::RegisterService, Arc::new(on_seen));

        shared.process_message(&Message::new("daemon", "farmer", "register_service", json!({})));

        assert!(!shared.registered.load(Ordering::Acquire));
        assert!(seen.lock().unwrap().is_empty());
    }
}
