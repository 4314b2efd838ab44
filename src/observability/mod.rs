//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Gate, stores and proxy produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters, gauges, histograms)
//!     → tower_http TraceLayer (per-request spans with x-request-id)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Prometheus scrape endpoint
//! ```

pub mod logging;
pub mod metrics;
