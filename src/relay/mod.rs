//! WebSocket relay subsystem.
//!
//! # Responsibilities
//! - Accept the inbound client upgrade
//! - Open the authenticated upstream connection
//! - Forward frames, unmodified, in both directions
//! - Tear down both connections together when either side ends
//!
//! # Data Flow
//! ```text
//! Client ←── frames ──→ [pump: client → upstream] ──→ Upstream
//!        ←── frames ──← [pump: upstream → client] ←──
//!                              │
//!                     completion signal (fires once)
//! ```
//!
//! # Design Decisions
//! - Frames are an opaque kind tag plus raw bytes; payloads are never parsed
//! - First terminal event wins; no half-duplex continuation
//! - The session joins both pump tasks before it returns
//! - No retries, no reconnection

pub mod connection;
pub mod error;
pub mod frame;
pub mod inbound;
pub mod pump;
pub mod service;
pub mod session;
pub mod signal;
pub mod upstream;

pub use connection::{Connection, Side};
pub use error::{ConnectError, TransportError, UpgradeError};
pub use frame::{Frame, FrameKind};
pub use pump::{Direction, PumpEnd, PumpReport};
pub use service::{Connect, ProxyService};
pub use session::{RelaySession, SessionId, SessionReport};
pub use signal::{CompletionSignal, SessionState};
pub use upstream::UpstreamConnector;
