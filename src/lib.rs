//! Realtime WebSocket relay library.
//!
//! Accepts local WebSocket clients and pairs each one with an authenticated
//! connection to the upstream realtime service, forwarding frames both ways
//! until either side goes away.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod relay;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use relay::ProxyService;
