//! Directional frame pump.
//!
//! Reads frames from one connection and writes them, unmodified and in
//! order, to the other. Any terminal condition fires the session signal and
//! closes the destination.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};

use crate::observability::metrics;
use crate::relay::connection::{close_sink, FrameSink, FrameStream, Side};
use crate::relay::error::TransportError;
use crate::relay::session::SessionId;
use crate::relay::signal::CompletionSignal;

/// Direction a pump forwards in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    ClientToUpstream,
    UpstreamToClient,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::ClientToUpstream => "client_to_upstream",
            Direction::UpstreamToClient => "upstream_to_client",
        }
    }

    /// Side the pump reads from.
    pub fn source(&self) -> Side {
        match self {
            Direction::ClientToUpstream => Side::Client,
            Direction::UpstreamToClient => Side::Upstream,
        }
    }

    /// Side the pump writes to.
    pub fn destination(&self) -> Side {
        match self {
            Direction::ClientToUpstream => Side::Upstream,
            Direction::UpstreamToClient => Side::Client,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a pump stopped.
#[derive(Debug)]
pub enum PumpEnd {
    /// The source ended (orderly close or dropped connection).
    SourceClosed,
    /// Reading from the source failed.
    ReadFailed(TransportError),
    /// Writing to the destination failed.
    WriteFailed(TransportError),
    /// The other pump fired the session signal first.
    Cancelled,
    /// The pump task panicked or was aborted.
    Aborted,
}

impl PumpEnd {
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            PumpEnd::ReadFailed(_) | PumpEnd::WriteFailed(_) | PumpEnd::Aborted
        )
    }
}

/// Outcome of one pump.
#[derive(Debug)]
pub struct PumpReport {
    pub direction: Direction,
    /// Frames written to the destination.
    pub frames: u64,
    pub end: PumpEnd,
    /// Whether this pump's terminal event fired the session signal.
    pub triggered: bool,
}

/// Forward frames from `source` to `destination` until either fails, the
/// source ends, or `signal` fires.
pub async fn pump(
    session_id: SessionId,
    direction: Direction,
    mut source: FrameStream,
    mut destination: FrameSink,
    signal: CompletionSignal,
    close_grace: Duration,
) -> PumpReport {
    // Released on panic too, so the sibling pump is never left waiting.
    let _release = signal.fire_on_drop();
    let mut frames = 0u64;

    let end = loop {
        let next = tokio::select! {
            biased;
            _ = signal.fired() => break PumpEnd::Cancelled,
            next = source.next() => next,
        };

        let frame = match next {
            Some(Ok(frame)) => frame,
            Some(Err(error)) => break PumpEnd::ReadFailed(error),
            None => break PumpEnd::SourceClosed,
        };

        let kind = frame.kind();
        let written = tokio::select! {
            biased;
            _ = signal.fired() => break PumpEnd::Cancelled,
            written = destination.send(frame) => written,
        };
        if let Err(error) = written {
            break PumpEnd::WriteFailed(error);
        }

        frames += 1;
        metrics::record_frame(direction.as_str(), kind.as_str());
        tracing::trace!(session_id = %session_id, direction = %direction, kind = %kind, "Frame forwarded");
    };

    let triggered = signal.fire();
    match &end {
        PumpEnd::ReadFailed(error) | PumpEnd::WriteFailed(error) => {
            tracing::debug!(
                session_id = %session_id,
                direction = %direction,
                error = %error,
                frames,
                "Relay pump failed"
            );
        }
        _ => {
            tracing::debug!(
                session_id = %session_id,
                direction = %direction,
                end = ?end,
                frames,
                "Relay pump stopped"
            );
        }
    }

    close_sink(direction.destination(), destination, close_grace).await;
    drop(source);

    PumpReport {
        direction,
        frames,
        end,
        triggered,
    }
}
