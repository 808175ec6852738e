//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, gauges, histograms via metrics)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → /metrics on the embedded HTTP endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - One process-wide Prometheus recorder; every registry shares it
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;

pub use self::metrics::MetricsRegistry;
