//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Executor, breaker and retry decorator produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, histograms via the metrics facade)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Prometheus scrape endpoint (CLI only)
//! ```
//!
//! The request id of a proxy call rides on the `invoke` span, so every event
//! emitted beneath it is correlated.

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
