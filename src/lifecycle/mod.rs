//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     trigger() → subscribers (HTTP server) stop accepting → exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → main triggers Shutdown → graceful shutdown
//! ```
//!
//! # Design Decisions
//! - The listener stops first; running relay sessions end with the process

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
