//! Components visible to factories and request handlers.

use fjall::{Keyspace, PartitionHandle};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::bus::{ConsumerHelper, Producer, ProducerMap};
use crate::config::PipelineConfig;
use crate::observability::MetricsRegistry;
use crate::storage::{PartitionGroup, PartitionGroupMap, PartitionedStore, StorageError, StorageManager};
use crate::tasks::ScheduledTaskQueue;

/// Registry of the assembled components.
///
/// Filled in step by step during startup, then frozen behind an `Arc` before
/// the first connection is accepted. Nothing is mutated afterwards, so
/// readers need no locking.
pub struct ServiceContext {
    config: PipelineConfig,
    metrics: MetricsRegistry,
    keyspace: Option<Keyspace>,
    partitions: HashMap<String, PartitionHandle>,
    groups: PartitionGroupMap,
    storage_manager: Option<Arc<dyn StorageManager>>,
    consumer_helper: Option<Arc<ConsumerHelper>>,
    producers: ProducerMap,
    task_queues: BTreeMap<String, Arc<ScheduledTaskQueue>>,
}

impl ServiceContext {
    pub fn new(config: PipelineConfig, metrics: MetricsRegistry) -> Self {
        Self {
            config,
            metrics,
            keyspace: None,
            partitions: HashMap::new(),
            groups: PartitionGroupMap::new(),
            storage_manager: None,
            consumer_helper: None,
            producers: ProducerMap::new(),
            task_queues: BTreeMap::new(),
        }
    }

    pub(crate) fn attach_storage(&mut self, store: &PartitionedStore) {
        self.keyspace = Some(store.keyspace().clone());
        self.partitions = store.partitions().clone();
        self.groups = store.groups().clone();
    }

    pub(crate) fn set_storage_manager(&mut self, manager: Arc<dyn StorageManager>) {
        self.storage_manager = Some(manager);
    }

    pub(crate) fn set_consumer_helper(&mut self, helper: Arc<ConsumerHelper>) {
        self.consumer_helper = Some(helper);
    }

    pub(crate) fn set_producers(&mut self, producers: ProducerMap) {
        self.producers = producers;
    }

    pub(crate) fn add_task_queue(&mut self, group: &str, queue: Arc<ScheduledTaskQueue>) {
        self.task_queues.insert(group.to_string(), queue);
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn metrics_registry(&self) -> &MetricsRegistry {
        &self.metrics
    }

    /// Engine handle, for batches spanning several partitions.
    pub fn keyspace(&self) -> Option<&Keyspace> {
        self.keyspace.as_ref()
    }

    /// Handle of a partition opened at startup.
    ///
    /// # Panics
    ///
    /// If `name` was not opened. Only call it for partitions known to exist.
    pub fn partition(&self, name: &str) -> PartitionHandle {
        self.try_partition(name)
            .unwrap_or_else(|e| panic!("fatal partition lookup: {e}"))
    }

    pub fn try_partition(&self, name: &str) -> Result<PartitionHandle, StorageError> {
        self.partitions
            .get(name)
            .cloned()
            .ok_or_else(|| StorageError::UnknownPartition(name.to_string()))
    }

    pub fn partition_groups(&self) -> &PartitionGroupMap {
        &self.groups
    }

    pub fn partition_group(&self, name: &str) -> Option<Arc<PartitionGroup>> {
        self.groups.get(name).cloned()
    }

    /// # Panics
    ///
    /// If no storage manager factory was registered.
    pub fn storage_manager(&self) -> Arc<dyn StorageManager> {
        self.try_storage_manager()
            .unwrap_or_else(|| panic!("storage manager requested but none is configured"))
    }

    pub fn try_storage_manager(&self) -> Option<Arc<dyn StorageManager>> {
        self.storage_manager.clone()
    }

    /// # Panics
    ///
    /// Before the message bus has been assembled.
    pub fn consumer_helper(&self) -> Arc<ConsumerHelper> {
        self.try_consumer_helper()
            .unwrap_or_else(|| panic!("consumer helper requested before the message bus was assembled"))
    }

    pub fn try_consumer_helper(&self) -> Option<Arc<ConsumerHelper>> {
        self.consumer_helper.clone()
    }

    /// Producer for a canonical topic. Absent topics are not an error.
    pub fn producer(&self, canonical: &str) -> Option<Arc<dyn Producer>> {
        self.producers.get(canonical).cloned()
    }

    /// # Panics
    ///
    /// If no task processor is registered for `group`.
    pub fn task_queue(&self, group: &str) -> Arc<ScheduledTaskQueue> {
        self.try_task_queue(group)
            .unwrap_or_else(|| panic!("no task queue configured for partition group '{group}'"))
    }

    pub fn try_task_queue(&self, group: &str) -> Option<Arc<ScheduledTaskQueue>> {
        self.task_queues.get(group).cloned()
    }

    pub fn task_queues(&self) -> &BTreeMap<String, Arc<ScheduledTaskQueue>> {
        &self.task_queues
    }
}

impl std::fmt::Debug for ServiceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceContext")
            .field("partitions", &self.partitions.len())
            .field("groups", &self.groups.keys().collect::<Vec<_>>())
            .field("storage_manager", &self.storage_manager.is_some())
            .field("producers", &self.producers.keys().collect::<Vec<_>>())
            .field("task_queues", &self.task_queues.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
