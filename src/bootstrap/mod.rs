//! Service assembly.
//!
//! # Data Flow
//! ```text
//! ServiceConfig (factories) + PipelineConfig (parameters)
//!     → resolve shard groups → open storage (migration gate inside)
//!     → storage manager → producers → consumer helper + consumers
//!     → task queues → bind server → freeze ServiceContext
//!     → handler strategy
//!     → start: storage manager → task queues → verify consumers
//!              → start consumers → health endpoint → accept connections
//! shutdown:
//!     server stop → endpoint → consumer stops → consumer destroys
//!     → task queues → producers → storage manager → engine close
//! ```
//!
//! # Design Decisions
//! - Startup and shutdown run on the caller's task; ordering is the only
//!   synchronization the sequence needs
//! - Startup failures are returned, never handled; the binary exits
//! - Shutdown never stops early; each step's outcome lands in the report

pub mod assembler;
pub mod context;
pub mod report;
pub mod service;

pub use assembler::Bootstrap;
pub use context::ServiceContext;
pub use report::{ShutdownReport, ShutdownStage, ShutdownStep};
pub use service::{ServiceConfig, ServiceConfigBuilder};
