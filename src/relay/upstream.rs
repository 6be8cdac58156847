//! Outbound connection to the upstream realtime service.
//!
//! # Responsibilities
//! - Parse and check the configured endpoint
//! - Attach the bearer credential and the fixed identification headers
//! - Perform the WebSocket handshake (TLS for `wss://`)
//!
//! # Design Decisions
//! - One attempt per session; a failed handshake is never retried
//! - The handshake is bounded by the connect timeout; everything after it
//!   runs without deadlines

use std::sync::Arc;
use std::time::Duration;

use tokio_tungstenite::tungstenite;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::header::{AUTHORIZATION, USER_AGENT};
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};

use crate::config::UpstreamConfig;
use crate::relay::connection::Connection;
use crate::relay::error::ConnectError;

/// Header carrying the protocol-beta opt-in.
pub const BETA_HEADER: HeaderName = HeaderName::from_static("openai-beta");

/// Dials the configured upstream endpoint.
#[derive(Debug, Clone)]
pub struct UpstreamConnector {
    config: Arc<UpstreamConfig>,
    connect_timeout: Duration,
}

impl UpstreamConnector {
    pub fn new(config: UpstreamConfig, connect_timeout: Duration) -> Self {
        Self {
            config: Arc::new(config),
            connect_timeout,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    /// Build the client handshake request with authentication headers.
    pub fn request(&self) -> Result<Request, ConnectError> {
        let endpoint = &self.config.endpoint;
        let url = url::Url::parse(endpoint).map_err(|e| ConnectError::InvalidEndpoint {
            endpoint: endpoint.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(ConnectError::InvalidEndpoint {
                endpoint: endpoint.clone(),
                reason: format!("unsupported scheme '{}'", url.scheme()),
            });
        }

        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| ConnectError::InvalidEndpoint {
                endpoint: endpoint.clone(),
                reason: e.to_string(),
            })?;

        let mut authorization =
            header_value("Authorization", &format!("Bearer {}", self.config.api_key))?;
        authorization.set_sensitive(true);

        let headers = request.headers_mut();
        headers.insert(AUTHORIZATION, authorization);
        headers.insert(USER_AGENT, header_value("User-Agent", &self.config.user_agent)?);
        headers.insert(BETA_HEADER, header_value("OpenAI-Beta", &self.config.beta)?);

        Ok(request)
    }

    /// Open one authenticated connection to the upstream endpoint.
    pub async fn connect(&self) -> Result<Connection, ConnectError> {
        let request = self.request()?;

        let handshake = tokio_tungstenite::connect_async(request);
        let result = match tokio::time::timeout(self.connect_timeout, handshake).await {
            Ok(result) => result,
            Err(_) => Err(tungstenite::Error::Io(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!(
                    "no handshake response within {}ms",
                    self.connect_timeout.as_millis()
                ),
            ))),
        };

        match result {
            Ok((socket, response)) => {
                tracing::debug!(
                    endpoint = %self.config.endpoint,
                    status = %response.status(),
                    "Upstream connected"
                );
                Ok(Connection::upstream(socket))
            }
            Err(error) => Err(ConnectError::handshake(error)),
        }
    }
}

fn header_value(name: &'static str, value: &str) -> Result<HeaderValue, ConnectError> {
    HeaderValue::from_str(value).map_err(|e| ConnectError::InvalidHeader {
        name,
        reason: e.to_string(),
    })
}
