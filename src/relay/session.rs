//! Relay session: one proxied call.
//!
//! # State Machine
//! ```text
//! Idle ──run()──▶ Running ──first terminal event──▶ Closing ──both pumps joined──▶ Closed
//! ```
//!
//! Whichever direction fails first tears down the whole session. There is
//! no half-duplex continuation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::observability::metrics;
use crate::relay::connection::{Connection, Side};
use crate::relay::pump::{pump, Direction, PumpEnd, PumpReport};
use crate::relay::signal::{CompletionSignal, SessionState};

/// Default bound on closing one connection during teardown.
pub const DEFAULT_CLOSE_GRACE: Duration = Duration::from_secs(5);

/// Global counter for session IDs.
/// Relaxed ordering is enough; only uniqueness matters.
static SESSION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

impl SessionId {
    pub fn new() -> Self {
        Self(SESSION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Outcome of a finished session.
#[derive(Debug)]
pub struct SessionReport {
    pub id: SessionId,
    pub client_to_upstream: PumpReport,
    pub upstream_to_client: PumpReport,
    pub duration: Duration,
}

impl SessionReport {
    /// The pump whose terminal event closed the session.
    pub fn trigger(&self) -> Option<&PumpReport> {
        [&self.client_to_upstream, &self.upstream_to_client]
            .into_iter()
            .find(|report| report.triggered)
    }
}

/// A paired client and upstream connection.
#[derive(Debug)]
pub struct RelaySession {
    id: SessionId,
    client: Connection,
    upstream: Connection,
    signal: CompletionSignal,
    close_grace: Duration,
}

impl RelaySession {
    pub fn new(client: Connection, upstream: Connection) -> Self {
        debug_assert_eq!(client.side(), Side::Client);
        debug_assert_eq!(upstream.side(), Side::Upstream);
        Self {
            id: SessionId::new(),
            client,
            upstream,
            signal: CompletionSignal::new(),
            close_grace: DEFAULT_CLOSE_GRACE,
        }
    }

    pub fn with_close_grace(mut self, close_grace: Duration) -> Self {
        self.close_grace = close_grace;
        self
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Handle to the session's completion signal, for observers.
    pub fn signal(&self) -> CompletionSignal {
        self.signal.clone()
    }

    /// Run both pumps and wait until the session is `Closed`.
    ///
    /// Returns only after both pump tasks have been joined, so neither
    /// connection is touched after this resolves. Dropping the returned
    /// future fires the signal and lets the pumps unwind on their own.
    pub async fn run(self) -> SessionReport {
        let RelaySession {
            id,
            client,
            upstream,
            signal,
            close_grace,
        } = self;
        let started = Instant::now();
        let _teardown = signal.fire_on_drop();

        let (client_stream, client_sink) = client.into_split();
        let (upstream_stream, upstream_sink) = upstream.into_split();

        signal.mark_running();
        metrics::record_session_started();
        tracing::info!(session_id = %id, "Relay session started");

        let outbound = tokio::spawn(pump(
            id,
            Direction::ClientToUpstream,
            client_stream,
            upstream_sink,
            signal.clone(),
            close_grace,
        ));
        let inbound = tokio::spawn(pump(
            id,
            Direction::UpstreamToClient,
            upstream_stream,
            client_sink,
            signal.clone(),
            close_grace,
        ));

        signal.fired().await;
        tracing::debug!(session_id = %id, "Relay session closing");

        let (outbound, inbound) = tokio::join!(outbound, inbound);
        let client_to_upstream = joined(id, Direction::ClientToUpstream, outbound);
        let upstream_to_client = joined(id, Direction::UpstreamToClient, inbound);

        signal.mark_closed();
        debug_assert_eq!(signal.state(), SessionState::Closed);

        let duration = started.elapsed();
        metrics::record_session_finished(duration);

        let report = SessionReport {
            id,
            client_to_upstream,
            upstream_to_client,
            duration,
        };
        tracing::info!(
            session_id = %id,
            closed_by = report.trigger().map(|r| r.direction.as_str()).unwrap_or("none"),
            client_frames = report.client_to_upstream.frames,
            upstream_frames = report.upstream_to_client.frames,
            duration_ms = duration.as_millis() as u64,
            "Relay session closed"
        );
        report
    }
}

fn joined(
    id: SessionId,
    direction: Direction,
    result: Result<PumpReport, tokio::task::JoinError>,
) -> PumpReport {
    result.unwrap_or_else(|error| {
        tracing::error!(session_id = %id, direction = %direction, error = %error, "Relay pump task failed");
        PumpReport {
            direction,
            frames: 0,
            end: PumpEnd::Aborted,
            triggered: false,
        }
    })
}
