//! Optional storage manager supplied by the concrete service.

use async_trait::async_trait;
use std::sync::Arc;

use crate::bootstrap::ServiceContext;
use crate::error::BoxError;

/// Service-specific maintenance over the opened partitions (replication,
/// snapshots, compaction schedules). Started before task queues and
/// destroyed just before the engine closes.
#[async_trait]
pub trait StorageManager: Send + Sync {
    async fn start(&self) -> Result<(), BoxError>;

    /// Blocks until the manager no longer touches any partition.
    async fn destroy(&self) -> Result<(), BoxError>;
}

/// Builds the storage manager. `storage.master_replica` is available
/// through the context configuration.
pub type StorageManagerFactory =
    Arc<dyn Fn(&ServiceContext) -> Result<Arc<dyn StorageManager>, BoxError> + Send + Sync>;
