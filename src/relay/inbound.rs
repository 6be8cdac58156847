//! Inbound WebSocket acceptance.
//!
//! # Responsibilities
//! - Complete the upgrade handshake with the local client
//! - Report requests that cannot be upgraded
//! - Hand the upgraded socket to the relay as a [`Connection`]
//!
//! # Design Decisions
//! - Any `Origin` is accepted and the client is not authenticated. The relay
//!   is meant to run next to its client or behind a reverse proxy that does
//!   those checks; this is a deployment assumption, not a security control.
//! - A failed upgrade never reaches the upstream side.

use std::future::Future;
use std::net::SocketAddr;

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::WebSocketUpgrade;
use axum::response::{IntoResponse, Response};

use crate::observability::metrics;
use crate::relay::connection::Connection;
use crate::relay::error::UpgradeError;

/// Upgrade one inbound request.
///
/// `on_connected` runs on the upgraded socket's task once the handshake
/// completes. If the request cannot be upgraded the rejection response is
/// returned and `on_connected` is dropped without being called.
pub fn accept<F, Fut>(
    peer: SocketAddr,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    on_connected: F,
) -> Response
where
    F: FnOnce(Connection) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let upgrade = match upgrade {
        Ok(upgrade) => upgrade,
        Err(rejection) => {
            let error = UpgradeError::Failed {
                reason: rejection.body_text(),
            };
            tracing::warn!(peer = %peer, error = %error, "Rejected inbound request");
            metrics::record_upgrade_failure();
            return rejection.into_response();
        }
    };

    upgrade
        .on_failed_upgrade(move |e: axum::Error| {
            let error = UpgradeError::Failed {
                reason: e.to_string(),
            };
            tracing::warn!(peer = %peer, error = %error, "Inbound handshake failed");
            metrics::record_upgrade_failure();
        })
        .on_upgrade(move |socket| async move {
            tracing::debug!(peer = %peer, "Client connected");
            on_connected(Connection::client(socket)).await;
        })
}
