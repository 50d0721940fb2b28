//! Socket side of the mock daemon: one session per client, pushes fanned
//! out to all of them.

use crate::handlers::DaemonState;
use daemonlink_core::Message;
use futures_util::{SinkExt, StreamExt};
use std::ops::ControlFlow;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, broadcast};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message as Frame;

const PUSH_BUFFER: usize = 100;

/// Reply to send, and whether the session keeps going afterwards.
type Step = ControlFlow<Option<String>, Option<String>>;

/// Daemon state plus the channel every session listens on for pushes.
#[derive(Clone)]
pub struct MockDaemon {
    state: Arc<Mutex<DaemonState>>,
    pushes: broadcast::Sender<String>,
}

impl MockDaemon {
    pub fn new(state: DaemonState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
            pushes: broadcast::channel(PUSH_BUFFER).0,
        }
    }

    /// Upgrade each accepted socket and run its session on its own task.
    pub async fn serve(self, listener: TcpListener) -> anyhow::Result<()> {
        tracing::info!("Listening on ws://{}", listener.local_addr()?);

        loop {
            let (stream, peer) = listener.accept().await?;
            let daemon = self.clone();
            tokio::spawn(async move {
                match daemon.accept(stream).await {
                    Ok(()) => tracing::debug!("Client {} disconnected", peer),
                    Err(e) => tracing::warn!("Client {} failed: {}", peer, e),
                }
            });
        }
    }

    async fn accept(&self, stream: TcpStream) -> anyhow::Result<()> {
        let ws = tokio_tungstenite::accept_async(stream).await?;
        self.session(ws).await
    }

    /// Serve one client until it closes, errors, or asks to exit.
    pub async fn session<S>(&self, ws: WebSocketStream<S>) -> anyhow::Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let (mut sink, mut frames) = ws.split();
        let mut pushes = self.pushes.subscribe();

        loop {
            let outgoing = tokio::select! {
                frame = frames.next() => match frame {
                    Some(Ok(Frame::Text(text))) => match self.on_request(text.as_str()).await? {
                        ControlFlow::Continue(reply) => reply,
                        ControlFlow::Break(reply) => {
                            if let Some(reply) = reply {
                                sink.send(Frame::Text(reply.into())).await?;
                            }
                            break;
                        }
                    },
                    Some(Ok(Frame::Close(_))) | None => break,
                    Some(Ok(_)) => None,
                    Some(Err(e)) => return Err(e.into()),
                },
                push = pushes.recv() => match push {
                    Ok(push) => Some(push),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!("Session dropped {} pushes", skipped);
                        None
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            };
            if let Some(text) = outgoing {
                sink.send(Frame::Text(text.into())).await?;
            }
        }

        let _ = sink.close().await;
        Ok(())
    }

    /// Handle one text frame. `Break` ends the session after the reply.
    async fn on_request(&self, text: &str) -> anyhow::Result<Step> {
        let request = match Message::decode(text) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!("Ignoring bad frame: {}", e);
                return Ok(ControlFlow::Continue(None));
            }
        };

        let outcome = self.state.lock().await.handle(&request);
        if let Some(push) = outcome.notify {
            // No subscribers just means no sessions are open.
            let _ = self.pushes.send(push.encode()?);
        }

        let reply = match outcome.reply {
            Some(data) if request.ack() => Some(request.reply(data).encode()?),
            _ => None,
        };
        if outcome.exit {
            tracing::info!("Exit requested by {}", request.origin());
            return Ok(ControlFlow::Break(reply));
        }
        Ok(ControlFlow::Continue(reply))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use daemonlink_core::Command;
    use serde_json::json;
    use tokio::io::DuplexStream;
    use tokio_tungstenite::tungstenite::protocol::Role;

    async fn attach(daemon: &MockDaemon) -> WebSocketStream<DuplexStream> {
        let (client, server) = tokio::io::duplex(64 * 1024);
        let server = WebSocketStream::from_raw_socket(server, Role::Server, None).await;
        let daemon = daemon.clone();
        tokio::spawn(async move { daemon.session(server).await });
        WebSocketStream::from_raw_socket(client, Role::Client, None).await
    }

    async fn send(ws: &mut WebSocketStream<DuplexStream>, command: &str, ack: bool) {
        let request = Message::new("wallet_ui", "daemon", command, json!({})).with_ack(ack);
        ws.send(Frame::Text(request.encode().unwrap().into())).await.unwrap();
    }

    async fn recv(ws: &mut WebSocketStream<DuplexStream>) -> Message {
        loop {
            match ws.next().await.unwrap().unwrap() {
                Frame::Text(text) => return Message::decode(text.as_str()).unwrap(),
                _ => continue,
            }
        }
    }

    #[tokio::test]
    async fn refresh_pushes_to_every_session() {
        let daemon = MockDaemon::new(DaemonState::new(1));
        let mut first = attach(&daemon).await;
        let mut second = attach(&daemon).await;

        // Round-trip on the second session so it is subscribed before the push.
        send(&mut second, "ping", true).await;
        assert_eq!(recv(&mut second).await.command(), &Command::Ping);

        send(&mut first, "refresh_plots", false).await;
        let push = recv(&mut second).await;
        assert_eq!(push.command(), &Command::StateChanged);
        assert_eq!(push.data()["state"], "plots_refreshed");
    }

    #[tokio::test]
    async fn exit_replies_then_closes() {
        let daemon = MockDaemon::new(DaemonState::new(0));
        let mut ws = attach(&daemon).await;

        send(&mut ws, "exit", true).await;
        assert!(recv(&mut ws).await.ack());
        loop {
            match ws.next().await {
                Some(Ok(Frame::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => continue,
            }
        }
    }
}
