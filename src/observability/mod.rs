//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → Log output (stdout)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Structured fields (session_id, direction, peer) on every relay event
//! - Metrics are cheap no-ops until an exporter is installed
//! - Credentials never appear in logs

pub mod logging;
pub mod metrics;
