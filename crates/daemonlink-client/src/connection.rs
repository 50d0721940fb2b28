//! One WebSocket shared by every service in the process.
//!
//! A [`Connection`] is a cheap, cloneable handle. The socket itself is owned
//! by a driver task spawned at construction; handles talk to it through an
//! outbound queue and two small registries:
//!
//! - pending requests, keyed by `request_id`, each resolved at most once;
//! - services, keyed by name, which receive everything that is not a
//!   response.
//!
//! Neither registry is locked across an `.await`.

use crate::service::{Service, ServiceShared};
use crate::{ClientConfig, ClientError, lock};
use daemonlink_core::{ConnectionState, Message, ServiceName};
use futures_util::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot, watch};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message as Frame;

type Resolver = oneshot::Sender<Result<Message, ClientError>>;

enum Outbound {
    Frame(String),
    Close,
}

#[derive(Default)]
struct Pending {
    closed: bool,
    requests: HashMap<String, Resolver>,
}

struct Inner {
    origin: ServiceName,
    request_timeout: Option<Duration>,
    outbound: mpsc::UnboundedSender<Outbound>,
    pending: Mutex<Pending>,
    services: Mutex<HashMap<String, Arc<ServiceShared>>>,
    state: watch::Sender<ConnectionState>,
}

/// Handle to the shared daemon connection.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

impl Connection {
    /// Dial the daemon at `config.url`.
    pub async fn connect(config: &ClientConfig) -> Result<Self, ClientError> {
        let (ws, _) = tokio_tungstenite::connect_async(config.url.as_str()).await?;
        tracing::debug!(url = %config.url, origin = %config.origin, "connected to daemon");
        Ok(Self::from_stream(ws, config))
    }

    /// Wrap an established WebSocket. Must be called inside a tokio runtime.
    pub fn from_stream<S>(ws: WebSocketStream<S>, config: &ClientConfig) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let (state, _) = watch::channel(ConnectionState::Open);
        let inner = Arc::new(Inner {
            origin: config.origin.clone(),
            request_timeout: config.request_timeout(),
            outbound,
            pending: Mutex::new(Pending::default()),
            services: Mutex::new(HashMap::new()),
            state,
        });
        tokio::spawn(drive(ws, outbound_rx, Arc::downgrade(&inner)));
        Self { inner }
    }

    /// Default sender identity for services on this connection.
    pub fn origin(&self) -> &ServiceName {
        &self.inner.origin
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    /// Route inbound messages addressed to `service.destination()` to it.
    ///
    /// A later registration under the same name replaces the earlier one.
    pub fn add_service(&self, service: &Service) {
        let name = service.destination().to_string();
        let previous = lock(&self.inner.services).insert(name, service.shared());
        if previous.is_some() {
            tracing::debug!(service = %service.destination(), "replaced service registration");
        }
    }

    /// Write `message` to the daemon.
    ///
    /// Without `ack` this returns `Ok(None)` once the frame is queued. With
    /// `ack` a `request_id` is assigned if missing and the call resolves
    /// with the correlated response. Responses flagged as failures by the
    /// daemon resolve as [`ClientError::Daemon`].
    pub async fn send(&self, message: Message) -> Result<Option<Message>, ClientError> {
        if !message.ack() {
            self.inner.write(message.encode()?)?;
            return Ok(None);
        }

        let request_id = message
            .request_id()
            .map_or_else(new_request_id, str::to_string);
        let message = message.with_request_id(request_id.clone());
        let frame = message.encode()?;

        let response = self.inner.register(&request_id)?;
        let _guard = PendingGuard {
            inner: &self.inner,
            request_id: &request_id,
        };
        self.inner.write(frame)?;
        tracing::trace!(
            request_id = %request_id,
            command = %message.command(),
            destination = message.destination(),
            "sent request"
        );

        let outcome = match self.inner.request_timeout {
            Some(timeout) => tokio::time::timeout(timeout, response)
                .await
                .map_err(|_| {
                    tracing::warn!(request_id = %request_id, ?timeout, "request timed out");
                    ClientError::Timeout {
                        request_id: request_id.clone(),
                        timeout,
                    }
                })?,
            None => response.await,
        };
        let response = outcome.map_err(|_| ClientError::ConnectionClosed)??;

        match ClientError::from_response(response.data()) {
            Some(err) => Err(err),
            None => Ok(Some(response)),
        }
    }

    /// Ask the driver to close the socket. In-flight requests fail with
    /// [`ClientError::ConnectionClosed`].
    pub fn close(&self) {
        let _ = self.inner.outbound.send(Outbound::Close);
    }

    /// Wait until the transport has closed.
    pub async fn closed(&self) {
        let mut state = self.inner.state.subscribe();
        let _ = state.wait_for(|s| *s == ConnectionState::Closed).await;
    }

    #[cfg(test)]
    pub(crate) fn pending_len(&self) -> usize {
        lock(&self.inner.pending).requests.len()
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("origin", &self.inner.origin)
            .field("state", &self.state())
            .finish()
    }
}

impl Inner {
    fn register(
        &self,
        request_id: &str,
    ) -> Result<oneshot::Receiver<Result<Message, ClientError>>, ClientError> {
        let mut pending = lock(&self.pending);
        if pending.closed {
            return Err(ClientError::ConnectionClosed);
        }
        match pending.requests.entry(request_id.to_string()) {
            Entry::Occupied(_) => Err(ClientError::DuplicateRequestId(request_id.to_string())),
            Entry::Vacant(slot) => {
                let (tx, rx) = oneshot::channel();
                slot.insert(tx);
                Ok(rx)
            }
        }
    }

    fn write(&self, frame: String) -> Result<(), ClientError> {
        if lock(&self.pending).closed {
            return Err(ClientError::ConnectionClosed);
        }
        self.outbound
            .send(Outbound::Frame(frame))
            .map_err(|_| ClientError::ConnectionClosed)
    }

    fn route(&self, frame: &str) {
        let message = match Message::decode(frame) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(error = %e, "dropping malformed frame");
                return;
            }
        };

        if let Some(request_id) = message.request_id() {
            let resolver = lock(&self.pending).requests.remove(request_id);
            if let Some(resolver) = resolver {
                tracing::trace!(request_id, "resolved request");
                let _ = resolver.send(Ok(message));
                return;
            }
        }

        let service = lock(&self.services).get(message.destination()).cloned();
        match service {
            Some(service) => service.process_message(&message),
            None => tracing::trace!(
                destination = message.destination(),
                command = %message.command(),
                "dropping unrouted message"
            ),
        }
    }

    fn shut_down(&self) {
        let drained: Vec<Resolver> = {
            let mut pending = lock(&self.pending);
            pending.closed = true;
            pending.requests.drain().map(|(_, resolver)| resolver).collect()
        };
        if !drained.is_empty() {
            tracing::debug!(pending = drained.len(), "failing in-flight requests");
        }
        for resolver in drained {
            let _ = resolver.send(Err(ClientError::ConnectionClosed));
        }
        self.state.send_replace(ConnectionState::Closed);
    }
}

/// Removes a pending entry when its caller stops waiting, whether it got a
/// response, timed out or was dropped.
struct PendingGuard<'a> {
    inner: &'a Inner,
    request_id: &'a str,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        lock(&self.inner.pending).requests.remove(self.request_id);
    }
}

fn new_request_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

async fn drive<S>(
    ws: WebSocketStream<S>,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    inner: Weak<Inner>,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut sink, mut stream) = ws.split();

    loop {
        tokio::select! {
            next = outbound.recv() => match next {
                Some(Outbound::Frame(text)) => {
                    if let Err(e) = sink.send(Frame::Text(text.into())).await {
                        tracing::warn!(error = %e, "failed to write frame");
                        break;
                    }
                }
                Some(Outbound::Close) | None => {
                    let _ = sink.close().await;
                    break;
                }
            },
            frame = stream.next() => match frame {
                Some(Ok(Frame::Text(text))) => match inner.upgrade() {
                    Some(inner) => inner.route(text.as_str()),
                    None => break,
                },
                Some(Ok(Frame::Close(_))) | None => break,
                // Ping/Pong are answered by tungstenite. Binary frames are not
                // part of the protocol.
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!(error = %e, "websocket read failed");
                    break;
                }
            },
        }
    }

    tracing::debug!("daemon connection closed");
    if let Some(inner) = inner.upgrade() {
        inner.shut_down();
    }
}
