//! One-time migration gating.
//!
//! # Data Flow
//! ```text
//! persisted VersionTimestamp (metadata partition)
//!     + target version timestamp (configuration)
//!     + wall clock
//!     → gate.rs (pure decision)
//!     → caller applies the one-off work and persists the new timestamp
//! ```
//!
//! # Design Decisions
//! - The gate never writes; persisting is the storage layer's job
//! - A stale target (outside the window) is skipped, never retried

pub mod gate;

pub use gate::{now_ms, MigrationGate, MAX_VERSION_TIMESTAMP_AGE};
