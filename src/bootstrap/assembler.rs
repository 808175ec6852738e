//! Startup and shutdown sequencing.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use crate::bootstrap::{ServiceConfig, ServiceContext, ShutdownReport, ShutdownStage};
use crate::bus::{
    parse_brokers, parse_consumer_configs, parse_producer_configs, referenced_topics, BusError,
    ConsumerHelper, MessageBus,
};
use crate::config::PipelineConfig;
use crate::error::BootstrapError;
use crate::handler::HandlerBuilder;
use crate::http::EmbeddedHttpServer;
use crate::net::server::PipelineServer;
use crate::observability::{metrics, MetricsRegistry};
use crate::sharding::parse_group_configs;
use crate::storage::{PartitionedStore, StorageManager, OFFSETS_PARTITION};
use crate::tasks::ScheduledTaskQueue;

/// A running service: every component assembled, started and listening.
pub struct Bootstrap {
    context: Arc<ServiceContext>,
    handlers: Arc<HandlerBuilder>,
    server: PipelineServer,
    endpoint: Option<EmbeddedHttpServer>,
    bus: MessageBus,
    task_queues: Vec<Arc<ScheduledTaskQueue>>,
    storage_manager: Option<Arc<dyn StorageManager>>,
    store: PartitionedStore,
}

impl Bootstrap {
    /// Assemble and start the service.
    ///
    /// Any error is fatal: components already built are not rolled back and
    /// the caller is expected to exit.
    pub async fn launch(service: ServiceConfig, config: PipelineConfig) -> Result<Self, BootstrapError> {
        let started = Instant::now();
        let registry = MetricsRegistry::install();

        // Shard groups, then storage.
        let groups = parse_group_configs(&config.storage.groups)?;
        let drop_groups = parse_group_configs(&config.storage.drop_groups)?;
        tracing::info!(
            groups = groups.len(),
            drop_groups = drop_groups.len(),
            "Resolved shard groups"
        );
        let store = PartitionedStore::open(&config.storage, &groups, &drop_groups, &service.tuning)?;

        let mut context = ServiceContext::new(config.clone(), registry.clone());
        context.attach_storage(&store);

        let storage_manager = match &service.storage_manager_factory {
            Some(factory) => {
                let manager = factory(&context)
                    .map_err(|e| BootstrapError::factory("storage manager", e))?;
                context.set_storage_manager(Arc::clone(&manager));
                tracing::info!(master_replica = config.storage.master_replica, "Storage manager built");
                Some(manager)
            }
            None => None,
        };

        // Message bus: producers first, since consumers may publish.
        let brokers = parse_brokers(&config.bus.brokers);
        let consumer_configs = parse_consumer_configs(&config.bus.consumers)?;
        let producer_configs = parse_producer_configs(&config.bus.producers)?;
        for consumer in consumer_configs.values().flatten() {
            if let Some(group) = &consumer.shard_group {
                if !context.partition_groups().contains_key(group) {
                    return Err(BootstrapError::UnknownPartitionGroup(group.clone()));
                }
            }
        }

        let mut bus = MessageBus::new(brokers.clone());
        let topics = referenced_topics(&producer_configs, &consumer_configs);
        if !topics.is_empty() {
            let factory = service
                .producer_factory
                .as_ref()
                .ok_or_else(|| BusError::MissingProducerFactory(topics.iter().cloned().collect()))?;
            for topic in &topics {
                let producer_config = producer_configs.get(topic).cloned().unwrap_or_default();
                bus.ensure_producer(topic, &producer_config, factory, &context)?;
            }
        }
        context.set_producers(bus.producers().clone());

        context.set_consumer_helper(Arc::new(ConsumerHelper::new(
            brokers,
            config.storage.version_timestamp_ms,
            store.partition(OFFSETS_PARTITION)?,
        )));
        let consumers = bus.build_consumers(&consumer_configs, &service.consumer_factories, &context)?;
        tracing::info!(producers = bus.producers().len(), consumers, "Message bus assembled");

        // Task queues, one per registered partition group.
        let mut task_queues = Vec::with_capacity(service.task_processor_factories.len());
        for (group, factory) in &service.task_processor_factories {
            let partitions = context
                .partition_group(group)
                .ok_or_else(|| BootstrapError::UnknownPartitionGroup(group.clone()))?;
            let processor = factory(group, &context)
                .map_err(|e| BootstrapError::factory(format!("task processor '{group}'"), e))?;
            let queue = Arc::new(ScheduledTaskQueue::new(partitions, processor, &config.tasks));
            context.add_task_queue(group, Arc::clone(&queue));
            task_queues.push(queue);
        }

        let context = Arc::new(context);
        let handlers = Arc::new(HandlerBuilder::new(
            service.handler_mode,
            Arc::clone(&service.handler_factory),
            Arc::clone(&context),
        )?);

        // Start, in dependency order.
        if let Some(manager) = &storage_manager {
            manager.start().await.map_err(|source| BootstrapError::Start {
                component: "storage manager".into(),
                source,
            })?;
        }
        for queue in &task_queues {
            queue.start()?;
        }
        bus.verify_all().await?;
        bus.start_all().await?;

        // Nothing listens on the request port until every component is up.
        let mut server = PipelineServer::bind(&config.server).await?;
        let mut endpoint = config.http.enabled.then(|| {
            EmbeddedHttpServer::new(config.http.bind_address(), server.local_addr(), registry.clone())
        });
        if let Some(endpoint) = endpoint.as_mut() {
            endpoint.start().await.map_err(BootstrapError::Endpoint)?;
        }
        server.start(Arc::clone(&handlers));

        metrics::record_startup(started);
        tracing::info!(
            address = %server.local_addr(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Service started"
        );

        Ok(Self {
            context,
            handlers,
            server,
            endpoint,
            bus,
            task_queues,
            storage_manager,
            store,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.server.local_addr()
    }

    /// Address of the health endpoint, when enabled.
    pub fn http_addr(&self) -> Option<SocketAddr> {
        self.endpoint.as_ref().and_then(EmbeddedHttpServer::local_addr)
    }

    pub fn context(&self) -> &Arc<ServiceContext> {
        &self.context
    }

    /// Tear everything down in reverse dependency order.
    ///
    /// Every step runs even when an earlier one failed; failures are logged
    /// and kept in the returned report.
    pub async fn shutdown(self) -> ShutdownReport {
        let Self {
            context,
            handlers,
            server,
            endpoint,
            mut bus,
            task_queues,
            storage_manager,
            store,
        } = self;
        let mut report = ShutdownReport::default();
        tracing::info!("Shutting down");

        server.stop().await;
        report.record(ShutdownStage::ServerStop, "request server", Ok::<(), String>(()));
        drop(handlers);

        if let Some(mut endpoint) = endpoint {
            let result = endpoint.destroy().await;
            report.record(ShutdownStage::EndpointDestroy, "health endpoint", result);
        }

        for name in bus.stop_all() {
            report.record(ShutdownStage::ConsumerStop, name, Ok::<(), String>(()));
        }
        for (name, result) in bus.destroy_consumers().await {
            report.record(ShutdownStage::ConsumerDestroy, name, result);
        }

        for queue in &task_queues {
            let result = queue.destroy().await;
            report.record(ShutdownStage::TaskQueueDestroy, queue.name(), result);
        }

        for (topic, result) in bus.destroy_producers().await {
            report.record(ShutdownStage::ProducerDestroy, topic, result);
        }

        if let Some(manager) = storage_manager {
            let result = manager.destroy().await;
            report.record(ShutdownStage::StorageManagerDestroy, "storage manager", result);
        }

        // Last references to partition handles outside the store.
        drop(task_queues);
        drop(bus);
        if Arc::strong_count(&context) > 1 {
            tracing::warn!("Service context still referenced at engine close");
        }
        drop(context);

        let result = store.close();
        report.record(ShutdownStage::EngineClose, "storage engine", result);

        if report.is_clean() {
            tracing::info!(steps = report.steps().len(), "Shutdown complete");
        } else {
            tracing::warn!(
                failed = report.failures().count(),
                "Shutdown complete with errors"
            );
        }
        report
    }
}

impl std::fmt::Debug for Bootstrap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bootstrap")
            .field("local_addr", &self.server.local_addr())
            .field("http_addr", &self.http_addr())
            .field("bus", &self.bus)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}
