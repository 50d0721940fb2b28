//! In-memory daemon for exercising a [`Connection`] end to end.

use crate::{ClientConfig, Connection};
use daemonlink_core::Message;
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::io::DuplexStream;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message as Frame;
use tokio_tungstenite::tungstenite::protocol::Role;

/// Server side of an in-memory WebSocket.
pub(crate) struct FakeDaemon {
    ws: WebSocketStream<DuplexStream>,
}

pub(crate) async fn pair(config: ClientConfig) -> (Connection, FakeDaemon) {
    let (client_io, daemon_io) = tokio::io::duplex(64 * 1024);
    let (client, daemon) = tokio::join!(
        WebSocketStream::from_raw_socket(client_io, Role::Client, None),
        WebSocketStream::from_raw_socket(daemon_io, Role::Server, None),
    );
    (
        Connection::from_stream(client, &config),
        FakeDaemon { ws: daemon },
    )
}

impl FakeDaemon {
    /// Next message written by the client.
    pub(crate) async fn recv(&mut self) -> Message {
        loop {
            let frame = self
                .ws
                .next()
                .await
                .expect("client hung up")
                .expect("websocket error");
            if let Frame::Text(text) = frame {
                return Message::decode(text.as_str()).expect("client sent a malformed frame");
            }
        }
    }

    pub(crate) async fn push(&mut self, message: &Message) {
        self.push_raw(&message.encode().unwrap()).await;
    }

    pub(crate) async fn push_raw(&mut self, text: &str) {
        self.ws.send(Frame::Text(text.to_string().into())).await.unwrap();
    }

    /// Assert the client writes nothing for a short while.
    pub(crate) async fn expect_silence(&mut self) {
        let next = tokio::time::timeout(Duration::from_millis(50), self.ws.next()).await;
        assert!(next.is_err(), "unexpected frame: {next:?}");
    }

    pub(crate) async fn close(&mut self) {
        let _ = self.ws.close(None).await;
    }
}
