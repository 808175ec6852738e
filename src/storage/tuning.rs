//! Engine and per-partition tuning.

use fjall::{Config, PartitionCreateOptions};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Adjusts engine-wide options before the engine is opened.
pub type KeyspaceTuner = Arc<dyn Fn(Config) -> Config + Send + Sync>;

/// Adjusts the options of one partition (or every partition of one group).
/// Receives the configured block-cache budget in megabytes.
pub type PartitionTuner =
    Arc<dyn Fn(u64, PartitionCreateOptions) -> PartitionCreateOptions + Send + Sync>;

const POINT_LOOKUP_BLOCK_SIZE: u32 = 4 * 1024;
const METADATA_MEMTABLE_SIZE: u32 = 4 * 1024 * 1024;

/// Tuning overrides supplied by the concrete service.
#[derive(Clone, Default)]
pub struct StorageTuning {
    /// Engine-wide override, applied before the block-cache budget.
    pub keyspace: Option<KeyspaceTuner>,
    /// Overrides keyed by group name or system partition name.
    pub partitions: HashMap<String, PartitionTuner>,
}

impl StorageTuning {
    /// Final engine config. The cache budget is applied last so the shared
    /// block cache always reflects `block_cache_size_mb`.
    pub fn keyspace_config(&self, path: &Path, parallelism: usize, block_cache_size_mb: u64) -> Config {
        let workers = parallelism.max(1);
        let mut config = Config::new(path)
            .flush_workers(workers)
            .compaction_workers(workers);
        if let Some(tuner) = &self.keyspace {
            config = tuner(config);
        }
        config.cache_size(block_cache_size_mb.saturating_mul(1024 * 1024))
    }

    /// Options for a system partition: point-lookup defaults, then override.
    pub fn system_options(&self, partition: &str, block_cache_size_mb: u64) -> PartitionCreateOptions {
        let mut options = PartitionCreateOptions::default().block_size(POINT_LOOKUP_BLOCK_SIZE);
        if partition != crate::storage::DEFAULT_PARTITION {
            options = options.max_memtable_size(METADATA_MEMTABLE_SIZE);
        }
        self.apply(partition, block_cache_size_mb, options)
    }

    /// Options for every partition of a shard group.
    pub fn group_options(&self, group: &str, block_cache_size_mb: u64) -> PartitionCreateOptions {
        self.apply(group, block_cache_size_mb, PartitionCreateOptions::default())
    }

    fn apply(
        &self,
        key: &str,
        block_cache_size_mb: u64,
        options: PartitionCreateOptions,
    ) -> PartitionCreateOptions {
        match self.partitions.get(key) {
            Some(tuner) => {
                tracing::debug!(partition = key, "Applying partition tuner");
                tuner(block_cache_size_mb, options)
            }
            None => options,
        }
    }
}

impl std::fmt::Debug for StorageTuning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<&String> = self.partitions.keys().collect();
        keys.sort();
        f.debug_struct("StorageTuning")
            .field("keyspace", &self.keyspace.is_some())
            .field("partitions", &keys)
            .finish()
    }
}
