//! Consumer cohort and producer registry.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::bootstrap::ServiceContext;
use crate::bus::{
    BusError, Consumer, ConsumerConfigMap, ConsumerFactory, ConsumerSpec, OffsetPolicy, Producer,
    ProducerConfig, ProducerConfigMap, ProducerFactory, ProducerMap, ProducerSpec,
};
use crate::error::BoxError;

/// Name of a torn-down component and the outcome of its teardown.
pub type TeardownOutcome = (String, Result<(), BoxError>);

/// Canonical topics that need a producer: every configured producer plus
/// every topic a consumer writes to.
pub fn referenced_topics(producers: &ProducerConfigMap, consumers: &ConsumerConfigMap) -> BTreeSet<String> {
    producers
        .keys()
        .cloned()
        .chain(
            consumers
                .values()
                .flatten()
                .flat_map(|config| config.producer_topics.iter().cloned()),
        )
        .collect()
}

/// Owns every producer and consumer for the process lifetime.
pub struct MessageBus {
    brokers: Vec<String>,
    producers: ProducerMap,
    consumers: Vec<Arc<dyn Consumer>>,
}

impl MessageBus {
    pub fn new(brokers: Vec<String>) -> Self {
        Self {
            brokers,
            producers: ProducerMap::new(),
            consumers: Vec::new(),
        }
    }

    pub fn brokers(&self) -> &[String] {
        &self.brokers
    }

    /// Producer for `canonical`, built on first request only.
    pub fn ensure_producer(
        &mut self,
        canonical: &str,
        config: &ProducerConfig,
        factory: &ProducerFactory,
        context: &ServiceContext,
    ) -> Result<Arc<dyn Producer>, BusError> {
        if let Some(existing) = self.producers.get(canonical) {
            return Ok(Arc::clone(existing));
        }
        let spec = ProducerSpec {
            canonical: canonical.to_string(),
            topic: config.physical_topic(canonical).to_string(),
            brokers: self.brokers.clone(),
            config: config.clone(),
        };
        let producer = factory(&spec, context).map_err(|source| BusError::Factory {
            component: format!("producer '{canonical}'"),
            source,
        })?;
        tracing::info!(topic = %canonical, physical_topic = %spec.topic, "Producer created");
        self.producers.insert(spec.canonical, Arc::clone(&producer));
        Ok(producer)
    }

    /// Producer for a canonical topic; `None` when the topic is not configured.
    pub fn producer(&self, canonical: &str) -> Option<Arc<dyn Producer>> {
        self.producers.get(canonical).cloned()
    }

    pub fn producers(&self) -> &ProducerMap {
        &self.producers
    }

    /// Build every consumer configured under a key that has a factory.
    /// Returns the number of consumers built.
    pub fn build_consumers(
        &mut self,
        configs: &ConsumerConfigMap,
        factories: &BTreeMap<String, ConsumerFactory>,
        context: &ServiceContext,
    ) -> Result<usize, BusError> {
        for key in configs.keys().filter(|key| !factories.contains_key(*key)) {
            tracing::warn!(key = %key, "Consumer configuration has no registered factory, ignoring");
        }

        let before = self.consumers.len();
        for (key, factory) in factories {
            let Some(entries) = configs.get(key).filter(|entries| !entries.is_empty()) else {
                tracing::info!(key = %key, "No configuration for consumer factory, skipping");
                continue;
            };
            for config in entries {
                let spec = ConsumerSpec {
                    key: key.clone(),
                    config: config.clone(),
                };
                let consumer = factory(&spec, context).map_err(|source| BusError::Factory {
                    component: format!("consumer '{key}' for topic '{}'", config.topic),
                    source,
                })?;
                tracing::info!(key = %key, topic = %config.topic, consumer = consumer.name(), "Consumer created");
                self.consumers.push(consumer);
            }
        }
        Ok(self.consumers.len() - before)
    }

    pub fn consumers(&self) -> &[Arc<dyn Consumer>] {
        &self.consumers
    }

    /// Run `init` on every consumer. The first failure aborts startup.
    pub async fn verify_all(&self) -> Result<(), BusError> {
        for consumer in &self.consumers {
            consumer
                .init(OffsetPolicy::Stored)
                .await
                .map_err(|source| BusError::Verify {
                    consumer: consumer.name().to_string(),
                    source,
                })?;
            tracing::debug!(consumer = consumer.name(), "Consumer verified");
        }
        tracing::info!(consumers = self.consumers.len(), "All consumers verified");
        Ok(())
    }

    /// Start every consumer. Only call after [`verify_all`](Self::verify_all).
    pub async fn start_all(&self) -> Result<(), BusError> {
        for consumer in &self.consumers {
            consumer.start().await.map_err(|source| BusError::Start {
                consumer: consumer.name().to_string(),
                source,
            })?;
        }
        tracing::info!(consumers = self.consumers.len(), "All consumers started");
        Ok(())
    }

    /// Signal every consumer to stop. Non-blocking; returns the names signalled.
    pub fn stop_all(&self) -> Vec<String> {
        self.consumers
            .iter()
            .map(|consumer| {
                consumer.stop();
                consumer.name().to_string()
            })
            .collect()
    }

    /// Destroy consumers one at a time, each awaited until quiescent.
    pub async fn destroy_consumers(&mut self) -> Vec<TeardownOutcome> {
        let mut outcomes = Vec::with_capacity(self.consumers.len());
        for consumer in self.consumers.drain(..) {
            let name = consumer.name().to_string();
            let result = consumer.destroy().await;
            if let Err(e) = &result {
                tracing::warn!(consumer = %name, error = %e, "Consumer destroy failed");
            }
            outcomes.push((name, result));
        }
        outcomes
    }

    pub async fn destroy_producers(&mut self) -> Vec<TeardownOutcome> {
        let mut outcomes = Vec::with_capacity(self.producers.len());
        for (topic, producer) in std::mem::take(&mut self.producers) {
            let result = producer.destroy().await;
            if let Err(e) = &result {
                tracing::warn!(topic = %topic, error = %e, "Producer destroy failed");
            }
            outcomes.push((topic, result));
        }
        outcomes
    }
}

impl std::fmt::Debug for MessageBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageBus")
            .field("brokers", &self.brokers)
            .field("producers", &self.producers.keys().collect::<Vec<_>>())
            .field("consumers", &self.consumers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{parse_consumer_configs, parse_producer_configs};
    use crate::config::PipelineConfig;
    use crate::observability::MetricsRegistry;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NullProducer(String);

    #[async_trait]
    impl Producer for NullProducer {
        fn topic(&self) -> &str {
            &self.0
        }

        async fn send(&self, _key: Option<&[u8]>, _payload: &[u8]) -> Result<(), BoxError> {
            Ok(())
        }

        async fn destroy(&self) -> Result<(), BoxError> {
            Ok(())
        }
    }

    fn context() -> ServiceContext {
        ServiceContext::new(PipelineConfig::default(), MetricsRegistry::install())
    }

    #[test]
    fn referenced_topics_union_producers_and_consumer_outputs() {
        let producers = parse_producer_configs(r#"{"audit": {}, "events": {}}"#).unwrap();
        let consumers = parse_consumer_configs(
            r#"{"k": [
                {"topic": "in", "group_id": "g", "producer_topics": ["events", "replies"]},
                {"topic": "in2", "group_id": "g", "producer_topics": ["replies"]}
            ]}"#,
        )
        .unwrap();
        let topics: Vec<_> = referenced_topics(&producers, &consumers).into_iter().collect();
        assert_eq!(topics, vec!["audit", "events", "replies"]);
    }

    #[test]
    fn producer_is_built_once_per_topic() {
        let built = Arc::new(AtomicUsize::new(0));
        let counter = built.clone();
        let factory: ProducerFactory = Arc::new(
            move |spec: &ProducerSpec, _ctx: &ServiceContext| -> Result<Arc<dyn Producer>, BoxError> {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Arc::new(NullProducer(spec.topic.clone())))
            },
        );
        let context = context();
        let mut bus = MessageBus::new(vec![]);
        let config = ProducerConfig {
            topic: Some("events-v2".into()),
            ..ProducerConfig::default()
        };

        let first = bus.ensure_producer("events", &config, &factory, &context).unwrap();
        let second = bus.ensure_producer("events", &config, &factory, &context).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(built.load(Ordering::SeqCst), 1);
        assert_eq!(first.topic(), "events-v2");

        assert!(bus.producer("events").is_some());
        assert!(bus.producer("unknown").is_none());
    }

    #[test]
    fn producer_factory_error_names_topic() {
        let factory: ProducerFactory = Arc::new(
            |_spec: &ProducerSpec, _ctx: &ServiceContext| -> Result<Arc<dyn Producer>, BoxError> {
                Err("broker unreachable".into())
            },
        );
        let mut bus = MessageBus::new(vec![]);
        let err = bus
            .ensure_producer("audit", &ProducerConfig::default(), &factory, &context())
            .err()
            .expect("factory error should surface");
        assert!(err.to_string().contains("producer 'audit'"));
    }
}
