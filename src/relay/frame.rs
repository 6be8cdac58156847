//! Opaque WebSocket frames.
//!
//! The client side speaks axum's `Message` and the upstream side speaks
//! tungstenite's `Message`. Both are mapped onto [`Frame`], a kind tag plus
//! the raw payload bytes, so the pumps never look inside a payload.

use axum::extract::ws as client_ws;
use bytes::Bytes;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message as UpstreamMessage;

use crate::relay::error::TransportError;

/// Kind of a relayed frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    Text,
    Binary,
    Ping,
    Pong,
    Close,
}

impl FrameKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FrameKind::Text => "text",
            FrameKind::Binary => "binary",
            FrameKind::Ping => "ping",
            FrameKind::Pong => "pong",
            FrameKind::Close => "close",
        }
    }
}

impl std::fmt::Display for FrameKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One WebSocket frame: kind tag and raw payload.
///
/// A close frame stores its wire payload: a big-endian status code followed
/// by the UTF-8 reason, or nothing when the peer sent a bare close.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    kind: FrameKind,
    payload: Bytes,
}

impl Frame {
    pub fn new(kind: FrameKind, payload: impl Into<Bytes>) -> Self {
        Self {
            kind,
            payload: payload.into(),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::new(FrameKind::Text, text.into())
    }

    pub fn binary(data: impl Into<Bytes>) -> Self {
        Self::new(FrameKind::Binary, data)
    }

    /// Close frame with a status code and reason.
    pub fn close(code: u16, reason: &str) -> Self {
        let mut payload = Vec::with_capacity(2 + reason.len());
        payload.extend_from_slice(&code.to_be_bytes());
        payload.extend_from_slice(reason.as_bytes());
        Self::new(FrameKind::Close, payload)
    }

    pub fn kind(&self) -> FrameKind {
        self.kind
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn into_parts(self) -> (FrameKind, Bytes) {
        (self.kind, self.payload)
    }

    /// Decodes the status code and reason of a close frame.
    ///
    /// Returns `None` for other kinds and for close payloads too short to
    /// hold a code.
    pub fn close_code(&self) -> Option<(u16, String)> {
        if self.kind != FrameKind::Close || self.payload.len() < 2 {
            return None;
        }
        let code = u16::from_be_bytes([self.payload[0], self.payload[1]]);
        let reason = String::from_utf8_lossy(&self.payload[2..]).into_owned();
        Some((code, reason))
    }

}

impl From<client_ws::Message> for Frame {
    fn from(message: client_ws::Message) -> Self {
        match message {
            client_ws::Message::Text(text) => Frame::new(FrameKind::Text, text),
            client_ws::Message::Binary(data) => Frame::new(FrameKind::Binary, data),
            client_ws::Message::Ping(data) => Frame::new(FrameKind::Ping, data),
            client_ws::Message::Pong(data) => Frame::new(FrameKind::Pong, data),
            client_ws::Message::Close(Some(close)) => Frame::close(close.code, close.reason.as_str()),
            client_ws::Message::Close(None) => Frame::new(FrameKind::Close, Bytes::new()),
        }
    }
}

impl TryFrom<Frame> for client_ws::Message {
    type Error = TransportError;

    fn try_from(frame: Frame) -> Result<Self, Self::Error> {
        let close = frame.close_code();
        let (kind, payload) = frame.into_parts();
        Ok(match kind {
            FrameKind::Text => client_ws::Message::Text(payload.try_into()?),
            FrameKind::Binary => client_ws::Message::Binary(payload),
            FrameKind::Ping => client_ws::Message::Ping(payload),
            FrameKind::Pong => client_ws::Message::Pong(payload),
            FrameKind::Close => client_ws::Message::Close(close.map(|(code, reason)| {
                client_ws::CloseFrame {
                    code,
                    reason: reason.into(),
                }
            })),
        })
    }
}

impl From<UpstreamMessage> for Frame {
    fn from(message: UpstreamMessage) -> Self {
        match message {
            UpstreamMessage::Text(text) => Frame::new(FrameKind::Text, text),
            UpstreamMessage::Binary(data) => Frame::new(FrameKind::Binary, data),
            UpstreamMessage::Ping(data) => Frame::new(FrameKind::Ping, data),
            UpstreamMessage::Pong(data) => Frame::new(FrameKind::Pong, data),
            UpstreamMessage::Close(Some(close)) => {
                Frame::close(u16::from(close.code), close.reason.as_str())
            }
            UpstreamMessage::Close(None) => Frame::new(FrameKind::Close, Bytes::new()),
            // Raw frames are only produced for writing; never seen on read.
            UpstreamMessage::Frame(raw) => {
                Frame::new(FrameKind::Binary, Bytes::copy_from_slice(raw.payload()))
            }
        }
    }
}

impl TryFrom<Frame> for UpstreamMessage {
    type Error = TransportError;

    fn try_from(frame: Frame) -> Result<Self, Self::Error> {
        let close = frame.close_code();
        let (kind, payload) = frame.into_parts();
        Ok(match kind {
            FrameKind::Text => UpstreamMessage::Text(payload.try_into()?),
            FrameKind::Binary => UpstreamMessage::Binary(payload),
            FrameKind::Ping => UpstreamMessage::Ping(payload),
            FrameKind::Pong => UpstreamMessage::Pong(payload),
            FrameKind::Close => UpstreamMessage::Close(close.map(|(code, reason)| CloseFrame {
                code: CloseCode::from(code),
                reason: reason.into(),
            })),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_payload_uses_wire_layout() {
        let frame = Frame::close(1000, "bye");
        assert_eq!(frame.payload().as_ref(), &[0x03, 0xE8, b'b', b'y', b'e']);
        assert_eq!(frame.close_code(), Some((1000, "bye".to_string())));
    }

    #[test]
    fn bare_close_has_no_code() {
        let frame = Frame::from(UpstreamMessage::Close(None));
        assert_eq!(frame.kind(), FrameKind::Close);
        assert!(frame.payload().is_empty());
        assert_eq!(frame.close_code(), None);

        let message = client_ws::Message::try_from(frame).unwrap();
        assert!(matches!(message, client_ws::Message::Close(None)));
    }

    #[test]
    fn upstream_close_reaches_client_with_same_code() {
        let upstream = UpstreamMessage::Close(Some(CloseFrame {
            code: CloseCode::Away,
            reason: "going away".into(),
        }));

        let message = client_ws::Message::try_from(Frame::from(upstream)).unwrap();
        match message {
            client_ws::Message::Close(Some(close)) => {
                assert_eq!(close.code, 1001);
                assert_eq!(close.reason.as_str(), "going away");
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn client_text_is_forwarded_byte_for_byte() {
        let frame = Frame::from(client_ws::Message::Text("héllo".into()));
        assert_eq!(frame.kind(), FrameKind::Text);
        assert_eq!(frame.payload().as_ref(), "héllo".as_bytes());

        match UpstreamMessage::try_from(frame).unwrap() {
            UpstreamMessage::Text(text) => assert_eq!(text.as_str(), "héllo"),
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn text_payload_is_shared_not_copied() {
        let payload = Bytes::from_static("shared".as_bytes());
        let frame = Frame::new(FrameKind::Text, payload.clone());

        match UpstreamMessage::try_from(frame).unwrap() {
            UpstreamMessage::Text(text) => {
                let relayed = Bytes::from(text);
                assert_eq!(relayed.as_ptr(), payload.as_ptr());
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn text_frame_with_invalid_utf8_is_rejected() {
        let frame = Frame::new(FrameKind::Text, vec![0xff, 0xfe]);
        let err = UpstreamMessage::try_from(frame.clone()).unwrap_err();
        assert!(matches!(err, TransportError::InvalidText(_)));
        let err = client_ws::Message::try_from(frame).unwrap_err();
        assert!(matches!(err, TransportError::InvalidText(_)));
    }

    #[test]
    fn kind_names() {
        assert_eq!(FrameKind::Pong.to_string(), "pong");
        assert_eq!(FrameKind::Close.as_str(), "close");
    }
}
