//! Embedded health / metrics endpoint.
//!
//! # Data Flow
//! ```text
//! GET /health  → TCP connect to the bound request server address → 200 | 503
//! GET /metrics → MetricsRegistry::render (Prometheus text)
//! ```

pub mod endpoint;

pub use endpoint::EmbeddedHttpServer;
