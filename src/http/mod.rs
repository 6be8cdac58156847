//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum router, tracing layer)
//!     → GET {listener.path} → relay::ProxyService::handle (WebSocket upgrade)
//!     → GET /health         → "ok"
//! ```

pub mod server;

pub use server::HttpServer;
