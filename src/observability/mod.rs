//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! HTTP layer, pipeline and command runner produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters and histograms)
//!
//! Consumers:
//!     → stdout (tracing-subscriber fmt layer)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Request ID is attached by the HTTP layer and shows up in trace spans
//! - Metric calls are no-ops until a recorder is installed

pub mod logging;
pub mod metrics;
