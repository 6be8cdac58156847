//! Error types for the relay subsystem.
//!
//! Errors before a session starts ([`UpgradeError`], [`ConnectError`]) abort
//! the request. Errors inside a running session ([`TransportError`]) end the
//! whole session.

use thiserror::Error;
use tokio_tungstenite::tungstenite;
use tokio_tungstenite::tungstenite::http::StatusCode;

/// The inbound WebSocket handshake did not complete.
#[derive(Debug, Error)]
pub enum UpgradeError {
    #[error("inbound upgrade failed: {reason}")]
    Failed { reason: String },
}

/// The outbound WebSocket handshake did not complete.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// Endpoint is not a URL or does not use a WebSocket scheme.
    #[error("invalid upstream endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    /// A handshake header value could not be encoded.
    #[error("invalid value for upstream header '{name}': {reason}")]
    InvalidHeader { name: &'static str, reason: String },

    /// Network, TLS or HTTP level failure during the handshake.
    #[error("upstream handshake failed: {source}")]
    HandshakeFailed {
        #[source]
        source: Box<tungstenite::Error>,
        /// Status of the HTTP response, when the upstream sent one.
        status: Option<StatusCode>,
    },
}

impl ConnectError {
    pub(crate) fn handshake(error: tungstenite::Error) -> Self {
        let status = match &error {
            tungstenite::Error::Http(response) => Some(response.status()),
            _ => None,
        };
        ConnectError::HandshakeFailed {
            source: Box::new(error),
            status,
        }
    }

    /// Short label used for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            ConnectError::InvalidEndpoint { .. } => "invalid_endpoint",
            ConnectError::InvalidHeader { .. } => "invalid_header",
            ConnectError::HandshakeFailed { status: Some(_), .. } => "rejected",
            ConnectError::HandshakeFailed { status: None, .. } => "handshake",
        }
    }
}

/// Read or write failure on a connection of a running session.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("client socket error: {0}")]
    Client(#[source] axum::Error),

    #[error("upstream socket error: {0}")]
    Upstream(#[source] tungstenite::Error),

    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A text frame whose payload is not valid UTF-8.
    #[error("text frame is not valid UTF-8: {0}")]
    InvalidText(#[from] std::str::Utf8Error),

    #[error("connection closed")]
    Closed,
}
