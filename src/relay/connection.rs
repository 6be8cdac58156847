//! Full-duplex frame channels.
//!
//! A [`Connection`] is a boxed frame stream (read side) plus a boxed frame
//! sink (write side). The session splits it so that one pump owns the read
//! half and the other pump owns the write half.

use std::pin::Pin;
use std::time::Duration;

use axum::extract::ws::WebSocket;
use futures_util::future;
use futures_util::stream::BoxStream;
use futures_util::{Sink, SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::WebSocketStream;

use crate::relay::error::TransportError;
use crate::relay::frame::Frame;

/// Read half: yields frames until the peer closes or an error occurs.
pub type FrameStream = BoxStream<'static, Result<Frame, TransportError>>;

/// Write half.
pub type FrameSink = Pin<Box<dyn Sink<Frame, Error = TransportError> + Send>>;

/// Which end of the relay a connection belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// The local client that connected to the relay.
    Client,
    /// The remote service the relay dialed.
    Upstream,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Client => "client",
            Side::Upstream => "upstream",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One message-oriented, full-duplex channel.
pub struct Connection {
    side: Side,
    stream: FrameStream,
    sink: FrameSink,
}

impl Connection {
    /// Build a connection from any frame stream and sink.
    pub fn new<St, Si>(side: Side, stream: St, sink: Si) -> Self
    where
        St: futures_util::Stream<Item = Result<Frame, TransportError>> + Send + 'static,
        Si: Sink<Frame, Error = TransportError> + Send + 'static,
    {
        Self {
            side,
            stream: stream.boxed(),
            sink: Box::pin(sink),
        }
    }

    /// Wrap an upgraded inbound socket.
    pub fn client(socket: WebSocket) -> Self {
        let (sink, stream) = socket.split();
        let stream = stream.map(|message| message.map(Frame::from).map_err(TransportError::Client));
        let sink = sink
            .sink_map_err(TransportError::Client)
            .with(|frame: Frame| future::ready(axum::extract::ws::Message::try_from(frame)));
        Self::new(Side::Client, stream, sink)
    }

    /// Wrap an established upstream socket.
    pub fn upstream<S>(socket: WebSocketStream<S>) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (sink, stream) = socket.split();
        let stream =
            stream.map(|message| message.map(Frame::from).map_err(TransportError::Upstream));
        let sink = sink.sink_map_err(TransportError::Upstream).with(|frame: Frame| {
            future::ready(tokio_tungstenite::tungstenite::Message::try_from(frame))
        });
        Self::new(Side::Upstream, stream, sink)
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn into_split(self) -> (FrameStream, FrameSink) {
        (self.stream, self.sink)
    }

    /// Close the connection without starting a session.
    pub async fn close(self, grace: Duration) {
        let side = self.side;
        let (stream, sink) = self.into_split();
        close_sink(side, sink, grace).await;
        drop(stream);
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection").field("side", &self.side).finish_non_exhaustive()
    }
}

/// Close a write half.
///
/// Closing an already-closed sink is a no-op; errors are logged at trace
/// level only. A peer that stops reading cannot hold the caller past `grace`.
pub(crate) async fn close_sink(side: Side, mut sink: FrameSink, grace: Duration) {
    match tokio::time::timeout(grace, sink.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(error)) => {
            tracing::trace!(side = %side, error = %error, "Close on already closed connection");
        }
        Err(_) => {
            tracing::debug!(side = %side, grace_ms = grace.as_millis() as u64, "Close timed out, dropping connection");
        }
    }
}
