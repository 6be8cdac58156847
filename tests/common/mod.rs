//! Shared utilities for relay integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::{HeaderMap, StatusCode};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use realtime_relay::config::{loader, ProxyConfig};
use realtime_relay::http::HttpServer;
use realtime_relay::lifecycle::Shutdown;

/// Bound for anything the relay is expected to do promptly.
pub const BOUND: Duration = Duration::from_secs(3);

pub const TEST_API_KEY: &str = "test-key";

pub type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How the mock upstream treats each connection.
#[derive(Debug, Clone, Copy)]
pub enum Behavior {
    /// Record every message, never answer.
    Record,
    /// Record every message and send data frames straight back.
    Echo,
    /// Refuse the handshake with this HTTP status.
    Reject(u16),
    /// Complete the handshake, then close right away.
    CloseImmediately,
}

/// What the mock upstream observed.
#[derive(Debug)]
pub enum UpstreamEvent {
    Handshake(HeaderMap),
    Message(Message),
    Closed,
}

pub struct MockUpstream {
    pub addr: SocketAddr,
    events: mpsc::UnboundedReceiver<UpstreamEvent>,
}

impl MockUpstream {
    pub async fn next_event(&mut self) -> UpstreamEvent {
        tokio::time::timeout(BOUND, self.events.recv())
            .await
            .expect("mock upstream saw nothing within the bound")
            .expect("mock upstream stopped")
    }

    pub async fn handshake_headers(&mut self) -> HeaderMap {
        match self.next_event().await {
            UpstreamEvent::Handshake(headers) => headers,
            other => panic!("expected handshake, got {other:?}"),
        }
    }

    /// Next data message, skipping handshake and control frames.
    pub async fn next_message(&mut self) -> Message {
        loop {
            match self.next_event().await {
                UpstreamEvent::Message(Message::Text(t)) => return Message::Text(t),
                UpstreamEvent::Message(Message::Binary(b)) => return Message::Binary(b),
                UpstreamEvent::Closed => panic!("upstream closed while waiting for a message"),
                _ => continue,
            }
        }
    }

    pub async fn wait_closed(&mut self) {
        loop {
            if let UpstreamEvent::Closed = self.next_event().await {
                return;
            }
        }
    }
}

/// Start a WebSocket server standing in for the realtime service.
pub async fn start_mock_upstream(behavior: Behavior) -> MockUpstream {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, events) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(serve_upstream(stream, behavior, tx.clone()));
        }
    });

    MockUpstream { addr, events }
}

async fn serve_upstream(
    stream: TcpStream,
    behavior: Behavior,
    tx: mpsc::UnboundedSender<UpstreamEvent>,
) {
    let handshake_tx = tx.clone();
    let callback = move |request: &Request, response: Response| {
        let _ = handshake_tx.send(UpstreamEvent::Handshake(request.headers().clone()));
        match behavior {
            Behavior::Reject(status) => {
                let mut rejection = ErrorResponse::new(Some("rejected".to_string()));
                *rejection.status_mut() = StatusCode::from_u16(status).unwrap();
                Err(rejection)
            }
            _ => Ok(response),
        }
    };

    let mut ws = match tokio_tungstenite::accept_hdr_async(stream, callback).await {
        Ok(ws) => ws,
        Err(_) => return,
    };

    if let Behavior::CloseImmediately = behavior {
        let _ = ws.close(None).await;
    }

    while let Some(Ok(message)) = ws.next().await {
        let data = message.is_text() || message.is_binary();
        if data && matches!(behavior, Behavior::Echo) {
            let _ = ws.send(message.clone()).await;
        }
        let _ = tx.send(UpstreamEvent::Message(message));
    }
    let _ = tx.send(UpstreamEvent::Closed);
}

/// Start the relay in-process, pointed at `upstream`.
pub async fn start_relay(upstream: SocketAddr) -> (SocketAddr, Shutdown) {
    start_relay_with_endpoint(format!("ws://{upstream}/v1/realtime?model=test")).await
}

pub async fn start_relay_with_endpoint(endpoint: String) -> (SocketAddr, Shutdown) {
    let mut config = ProxyConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.upstream.endpoint = endpoint;
    config.upstream.api_key = TEST_API_KEY.to_string();
    config.timeouts.connect_secs = 2;
    config.timeouts.close_grace_secs = 1;
    let config = loader::finalize(config).unwrap();

    let listener = TcpListener::bind(&config.listener.bind_address).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config);
    let rx = shutdown.subscribe();
    tokio::spawn(async move {
        server.run(listener, rx).await.unwrap();
    });

    (addr, shutdown)
}

pub async fn connect_client(relay: SocketAddr) -> Client {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{relay}/ws"))
        .await
        .unwrap();
    ws
}

/// Wait until the relay closes the client, ignoring any data still in flight.
pub async fn expect_client_closed(client: &mut Client) {
    tokio::time::timeout(BOUND, async {
        loop {
            match client.next().await {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return,
                Some(Ok(_)) => continue,
            }
        }
    })
    .await
    .expect("relay did not close the client within the bound");
}
