//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! discovery, build session, executor, http
//!     → logging.rs (tracing subscriber, fmt or JSON)
//!     → metrics.rs (counters, gauges, histograms → Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured fields on every event (route, source, duration_ms)
//! - Request ID is set by the HTTP layer and shows up in the trace span
//! - Metrics are opt-in; recording without an exporter costs nothing

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
pub use metrics::init_metrics;
