//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, connection limits)
//!     → connection.rs (id, idle timeout, lifecycle tracking)
//!     → server.rs (vend handler, run it, notify close)
//!     → RequestHandler owns the wire protocol
//! ```
//!
//! # Design Decisions
//! - Bounded accept queue prevents resource exhaustion
//! - Each connection tracked for graceful shutdown
//! - Idle timeout applies to every read, not to the whole connection

pub mod connection;
pub mod listener;
pub mod server;
