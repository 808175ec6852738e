//! Task processor contract.

use async_trait::async_trait;
use std::sync::Arc;

use crate::bootstrap::ServiceContext;
use crate::error::BoxError;

/// A stored task that has come due.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledTask {
    pub shard_index: u32,
    pub due_ms: u64,
    pub seq: u64,
    pub payload: Vec<u8>,
}

/// Service logic run for each due task.
#[async_trait]
pub trait ScheduledTaskProcessor: Send + Sync {
    /// An `Err` leaves the task queued for the next poll.
    async fn process(&self, task: &ScheduledTask) -> Result<(), BoxError>;
}

/// Builds the processor for the named partition group.
pub type TaskProcessorFactory = Arc<
    dyn Fn(&str, &ServiceContext) -> Result<Arc<dyn ScheduledTaskProcessor>, BoxError>
        + Send
        + Sync,
>;
