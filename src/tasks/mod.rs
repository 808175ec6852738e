//! Scheduled-task subsystem.
//!
//! # Data Flow
//! ```text
//! enqueue(shard_index, due_ms, payload)
//!     → partition of the shard (key = due_ms BE ++ seq BE)
//! worker (every poll_interval_ms)
//!     → poll_once: due tasks per partition, up to batch_size
//!     → ScheduledTaskProcessor::process
//!     → success: remove | failure: keep for the next poll
//! ```
//!
//! # Design Decisions
//! - Big-endian keys make the partition's natural order the due order
//! - One queue per partition group; queues are destroyed before the
//!   storage engine closes

pub mod processor;
pub mod queue;

pub use processor::{ScheduledTask, ScheduledTaskProcessor, TaskProcessorFactory};
pub use queue::{ScheduledTaskQueue, TaskError};
