//! Composition specification supplied by the concrete service.

use std::collections::BTreeMap;

use crate::bus::{ConsumerFactory, ProducerFactory};
use crate::handler::{HandlerFactory, HandlerMode};
use crate::storage::{KeyspaceTuner, PartitionTuner, StorageManagerFactory, StorageTuning};
use crate::tasks::TaskProcessorFactory;

/// How to build each pluggable component. Immutable once built.
#[derive(Clone)]
pub struct ServiceConfig {
    pub(crate) handler_factory: HandlerFactory,
    pub(crate) handler_mode: HandlerMode,
    pub(crate) consumer_factories: BTreeMap<String, ConsumerFactory>,
    pub(crate) producer_factory: Option<ProducerFactory>,
    pub(crate) storage_manager_factory: Option<StorageManagerFactory>,
    pub(crate) task_processor_factories: BTreeMap<String, TaskProcessorFactory>,
    pub(crate) tuning: StorageTuning,
}

impl ServiceConfig {
    /// The request handler is the one required component.
    pub fn builder(handler_factory: HandlerFactory) -> ServiceConfigBuilder {
        ServiceConfigBuilder {
            inner: ServiceConfig {
                handler_factory,
                handler_mode: HandlerMode::default(),
                consumer_factories: BTreeMap::new(),
                producer_factory: None,
                storage_manager_factory: None,
                task_processor_factories: BTreeMap::new(),
                tuning: StorageTuning::default(),
            },
        }
    }

    pub fn handler_mode(&self) -> HandlerMode {
        self.handler_mode
    }
}

impl std::fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("handler_mode", &self.handler_mode)
            .field("consumers", &self.consumer_factories.keys().collect::<Vec<_>>())
            .field("producer_factory", &self.producer_factory.is_some())
            .field("storage_manager_factory", &self.storage_manager_factory.is_some())
            .field("task_processors", &self.task_processor_factories.keys().collect::<Vec<_>>())
            .field("tuning", &self.tuning)
            .finish()
    }
}

pub struct ServiceConfigBuilder {
    inner: ServiceConfig,
}

impl ServiceConfigBuilder {
    pub fn handler_mode(mut self, mode: HandlerMode) -> Self {
        self.inner.handler_mode = mode;
        self
    }

    /// Factory for consumers configured under `key` in `[bus].consumers`.
    pub fn consumer(mut self, key: impl Into<String>, factory: ConsumerFactory) -> Self {
        self.inner.consumer_factories.insert(key.into(), factory);
        self
    }

    pub fn producer(mut self, factory: ProducerFactory) -> Self {
        self.inner.producer_factory = Some(factory);
        self
    }

    pub fn storage_manager(mut self, factory: StorageManagerFactory) -> Self {
        self.inner.storage_manager_factory = Some(factory);
        self
    }

    /// Task processor for the partition group `group`.
    pub fn task_processor(mut self, group: impl Into<String>, factory: TaskProcessorFactory) -> Self {
        self.inner.task_processor_factories.insert(group.into(), factory);
        self
    }

    /// Options override for a shard group or a system partition.
    pub fn partition_tuner(mut self, name: impl Into<String>, tuner: PartitionTuner) -> Self {
        self.inner.tuning.partitions.insert(name.into(), tuner);
        self
    }

    pub fn keyspace_tuner(mut self, tuner: KeyspaceTuner) -> Self {
        self.inner.tuning.keyspace = Some(tuner);
        self
    }

    pub fn build(self) -> ServiceConfig {
        self.inner
    }
}
