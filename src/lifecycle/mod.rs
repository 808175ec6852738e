//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     trigger() → every listener's recv() resolves, including late subscribers
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → binary calls Bootstrap::shutdown
//! ```
//!
//! # Design Decisions
//! - The startup and shutdown sequences themselves live in `bootstrap`
//! - Background workers (server, endpoint, task queues) each own a Shutdown
//!   so they can be stopped one at a time, in order

pub mod shutdown;
pub mod signals;

pub use shutdown::{Shutdown, ShutdownListener};
