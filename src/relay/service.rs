//! Public relay entry point.
//!
//! # Data Flow
//! ```text
//! handle(peer, upgrade)
//!     → inbound::accept        (upgrade fails → rejection response, stop)
//!     → relay(client)
//!         → Connect::connect   (fails → close client, stop)
//!         → RelaySession::run  (returns when both pumps are joined)
//! ```

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::WebSocketUpgrade;
use axum::response::Response;

use crate::config::ProxyConfig;
use crate::observability::metrics;
use crate::relay::connection::Connection;
use crate::relay::error::ConnectError;
use crate::relay::inbound;
use crate::relay::session::{RelaySession, SessionReport, DEFAULT_CLOSE_GRACE};
use crate::relay::upstream::UpstreamConnector;

/// Source of upstream connections.
pub trait Connect: Send + Sync + 'static {
    fn connect(&self) -> impl Future<Output = Result<Connection, ConnectError>> + Send;
}

impl Connect for UpstreamConnector {
    fn connect(&self) -> impl Future<Output = Result<Connection, ConnectError>> + Send {
        UpstreamConnector::connect(self)
    }
}

/// Pairs every inbound client with a fresh upstream connection.
#[derive(Debug)]
pub struct ProxyService<C = UpstreamConnector> {
    connector: C,
    close_grace: Duration,
}

impl ProxyService<UpstreamConnector> {
    pub fn from_config(config: &ProxyConfig) -> Self {
        let connector = UpstreamConnector::new(
            config.upstream.clone(),
            Duration::from_secs(config.timeouts.connect_secs),
        );
        Self::with_connector(connector)
            .with_close_grace(Duration::from_secs(config.timeouts.close_grace_secs))
    }
}

impl<C: Connect> ProxyService<C> {
    pub fn with_connector(connector: C) -> Self {
        Self {
            connector,
            close_grace: DEFAULT_CLOSE_GRACE,
        }
    }

    pub fn with_close_grace(mut self, close_grace: Duration) -> Self {
        self.close_grace = close_grace;
        self
    }

    /// Handle one inbound request: upgrade it, then relay on the upgraded socket.
    pub fn handle(
        self: &Arc<Self>,
        peer: SocketAddr,
        upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    ) -> Response {
        let service = Arc::clone(self);
        inbound::accept(peer, upgrade, move |client| async move {
            // Failures are logged inside relay().
            let _ = service.relay(client).await;
        })
    }

    /// Connect upstream for an accepted client and run the session.
    ///
    /// Resolves once the session is closed. If the upstream handshake fails
    /// the client connection is closed and no session is started.
    pub async fn relay(&self, client: Connection) -> Result<SessionReport, ConnectError> {
        let upstream = match self.connector.connect().await {
            Ok(upstream) => upstream,
            Err(error) => {
                tracing::warn!(
                    error = %error,
                    status = ?error_status(&error),
                    "Failed to connect upstream, closing client"
                );
                metrics::record_upstream_failure(error.reason());
                client.close(self.close_grace).await;
                return Err(error);
            }
        };

        let session = RelaySession::new(client, upstream).with_close_grace(self.close_grace);
        Ok(session.run().await)
    }
}

fn error_status(error: &ConnectError) -> Option<u16> {
    match error {
        ConnectError::HandshakeFailed { status, .. } => status.map(|s| s.as_u16()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::connection::testing::pair;
    use crate::relay::connection::Side;
    use crate::relay::frame::Frame;
    use crate::relay::pump::PumpEnd;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio_tungstenite::tungstenite;

    /// Hands out pre-built upstream connections, or fails.
    struct FakeConnector {
        upstream: Mutex<Option<Connection>>,
        attempts: AtomicUsize,
    }

    impl FakeConnector {
        fn ready(upstream: Connection) -> Self {
            Self {
                upstream: Mutex::new(Some(upstream)),
                attempts: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                upstream: Mutex::new(None),
                attempts: AtomicUsize::new(0),
            }
        }
    }

    impl Connect for FakeConnector {
        async fn connect(&self) -> Result<Connection, ConnectError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            self.upstream.lock().unwrap().take().ok_or_else(|| {
                ConnectError::handshake(tungstenite::Error::Io(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "simulated handshake failure",
                )))
            })
        }
    }

    const BOUND: Duration = Duration::from_secs(2);

    #[tokio::test]
    async fn failed_upstream_closes_client_without_session() {
        let service = ProxyService::with_connector(FakeConnector::failing())
            .with_close_grace(Duration::from_millis(200));
        let (client, mut client_peer) = pair(Side::Client);
        client_peer.send(Frame::text("never relayed"));

        let err = tokio::time::timeout(BOUND, service.relay(client))
            .await
            .expect("relay must return promptly")
            .unwrap_err();

        assert!(matches!(err, ConnectError::HandshakeFailed { .. }));
        assert_eq!(service.connector.attempts.load(Ordering::SeqCst), 1);
        // Client write half closed, nothing was pumped to it.
        assert!(client_peer.written_until_closed().await.is_empty());
    }

    #[tokio::test]
    async fn relays_until_client_leaves() {
        let (upstream, mut upstream_peer) = pair(Side::Upstream);
        let service = ProxyService::with_connector(FakeConnector::ready(upstream));
        let (client, client_peer) = pair(Side::Client);

        client_peer.send(Frame::text("hello"));
        client_peer.send(Frame::text("world"));
        client_peer.hang_up();

        let report = tokio::time::timeout(BOUND, service.relay(client))
            .await
            .expect("relay must return once the client closes")
            .unwrap();

        assert!(matches!(report.client_to_upstream.end, PumpEnd::SourceClosed));
        assert_eq!(
            upstream_peer.written_until_closed().await,
            vec![Frame::text("hello"), Frame::text("world")]
        );
    }

    #[test]
    fn from_config_uses_timeouts() {
        let mut config = ProxyConfig::default();
        config.upstream.api_key = "sk-test".to_string();
        config.timeouts.close_grace_secs = 7;

        let service = ProxyService::from_config(&config);
        assert_eq!(service.close_grace, Duration::from_secs(7));
        assert_eq!(service.connector.endpoint(), config.upstream.endpoint);
    }
}
