//! Ordered partition handles of one shard group.

use fjall::PartitionHandle;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::sharding::{partition_name, ShardGroupConfig};

/// Partition groups keyed by group name.
pub type PartitionGroupMap = BTreeMap<String, Arc<PartitionGroup>>;

/// The partitions of one shard group, in shard-index order.
#[derive(Clone)]
pub struct PartitionGroup {
    name: String,
    config: ShardGroupConfig,
    handles: Vec<PartitionHandle>,
}

impl PartitionGroup {
    pub(crate) fn new(name: &str, config: ShardGroupConfig, handles: Vec<PartitionHandle>) -> Self {
        debug_assert_eq!(handles.len(), config.local_virtual_shard_count as usize);
        Self {
            name: name.to_string(),
            config,
            handles,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &ShardGroupConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Handle at a local index (0-based position within the group).
    pub fn get(&self, local_index: usize) -> Option<&PartitionHandle> {
        self.handles.get(local_index)
    }

    /// Partition hosting the logical `shard_index`, if this group hosts it.
    pub fn partition_for_shard(&self, shard_index: u32) -> Option<&PartitionHandle> {
        self.config
            .local_index(shard_index)
            .and_then(|local| self.handles.get(local as usize))
    }

    /// `(shard_index, partition_name, handle)` in shard-index order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, String, &PartitionHandle)> + '_ {
        self.handles.iter().enumerate().map(move |(local, handle)| {
            let local = local as u32;
            (self.config.shard_index(local), partition_name(&self.name, local), handle)
        })
    }

    pub fn handles(&self) -> &[PartitionHandle] {
        &self.handles
    }
}

impl std::fmt::Debug for PartitionGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartitionGroup")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("partitions", &self.handles.len())
            .finish()
    }
}
