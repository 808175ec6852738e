//! Shared fixtures: recording fakes that append to one journal.
#![allow(dead_code)]

use async_trait::async_trait;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use kv_pipeline::bus::{
    Consumer, ConsumerFactory, ConsumerSpec, OffsetPolicy, Producer, ProducerFactory, ProducerSpec,
};
use kv_pipeline::storage::{StorageManager, StorageManagerFactory};
use kv_pipeline::tasks::{ScheduledTask, ScheduledTaskProcessor, TaskProcessorFactory};
use kv_pipeline::{BoxError, PipelineConfig, ServiceContext};

/// Ordered record of collaborator calls.
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn record(&self, event: impl Into<String>) {
        self.0.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn position(&self, event: &str) -> Option<usize> {
        self.events().iter().position(|e| e == event)
    }

    pub fn count_prefix(&self, prefix: &str) -> usize {
        self.events().iter().filter(|e| e.starts_with(prefix)).count()
    }

    /// Indices of every event starting with `prefix`.
    pub fn positions(&self, prefix: &str) -> Vec<usize> {
        self.events()
            .iter()
            .enumerate()
            .filter(|(_, e)| e.starts_with(prefix))
            .map(|(i, _)| i)
            .collect()
    }
}

/// Loopback config under `dir`, endpoint disabled, ephemeral port.
pub fn test_config(dir: &Path) -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.storage.path = dir.join("db").to_string_lossy().into_owned();
    config.storage.block_cache_size_mb = 8;
    config.server.host = "127.0.0.1".into();
    config.server.port = 0;
    config.http.enabled = false;
    config.http.host = "127.0.0.1".into();
    config.http.port = 0;
    config.tasks.poll_interval_ms = 60_000;
    config
}

pub struct RecordingConsumer {
    name: String,
    journal: Journal,
    fail_init: bool,
}

#[async_trait]
impl Consumer for RecordingConsumer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn init(&self, policy: OffsetPolicy) -> Result<(), BoxError> {
        assert_eq!(policy, OffsetPolicy::Stored);
        tokio::time::sleep(Duration::from_millis(5)).await;
        self.journal.record(format!("consumer.init:{}", self.name));
        if self.fail_init {
            return Err("offsets inconsistent".into());
        }
        Ok(())
    }

    async fn start(&self) -> Result<(), BoxError> {
        self.journal.record(format!("consumer.start:{}", self.name));
        Ok(())
    }

    fn stop(&self) {
        self.journal.record(format!("consumer.stop:{}", self.name));
    }

    async fn destroy(&self) -> Result<(), BoxError> {
        self.journal.record(format!("consumer.destroy.begin:{}", self.name));
        tokio::time::sleep(Duration::from_millis(10)).await;
        self.journal.record(format!("consumer.destroy.end:{}", self.name));
        Ok(())
    }
}

/// Consumer named `{key}/{topic}`; fails `init` when the topic is `fail_topic`.
pub fn consumer_factory(journal: &Journal, fail_topic: Option<&str>) -> ConsumerFactory {
    let journal = journal.clone();
    let fail_topic = fail_topic.map(str::to_string);
    Arc::new(
        move |spec: &ConsumerSpec, ctx: &ServiceContext| -> Result<Arc<dyn Consumer>, BoxError> {
            // Helper is assembled before any consumer.
            let _helper = ctx.consumer_helper();
            Ok(Arc::new(RecordingConsumer {
                name: format!("{}/{}", spec.key, spec.config.topic),
                journal: journal.clone(),
                fail_init: fail_topic.as_deref() == Some(spec.config.topic.as_str()),
            }))
        },
    )
}

pub struct RecordingProducer {
    canonical: String,
    topic: String,
    journal: Journal,
}

#[async_trait]
impl Producer for RecordingProducer {
    fn topic(&self) -> &str {
        &self.topic
    }

    async fn send(&self, _key: Option<&[u8]>, payload: &[u8]) -> Result<(), BoxError> {
        self.journal.record(format!(
            "producer.send:{}:{}",
            self.canonical,
            String::from_utf8_lossy(payload)
        ));
        Ok(())
    }

    async fn destroy(&self) -> Result<(), BoxError> {
        self.journal.record(format!("producer.destroy:{}", self.canonical));
        Ok(())
    }
}

pub fn producer_factory(journal: &Journal) -> ProducerFactory {
    let journal = journal.clone();
    Arc::new(
        move |spec: &ProducerSpec, _ctx: &ServiceContext| -> Result<Arc<dyn Producer>, BoxError> {
            journal.record(format!("producer.create:{}", spec.canonical));
            Ok(Arc::new(RecordingProducer {
                canonical: spec.canonical.clone(),
                topic: spec.topic.clone(),
                journal: journal.clone(),
            }))
        },
    )
}

pub struct RecordingStorageManager {
    journal: Journal,
}

#[async_trait]
impl StorageManager for RecordingStorageManager {
    async fn start(&self) -> Result<(), BoxError> {
        self.journal.record("storage_manager.start");
        Ok(())
    }

    async fn destroy(&self) -> Result<(), BoxError> {
        self.journal.record("storage_manager.destroy");
        Ok(())
    }
}

pub fn storage_manager_factory(journal: &Journal) -> StorageManagerFactory {
    let journal = journal.clone();
    Arc::new(move |_ctx: &ServiceContext| -> Result<Arc<dyn StorageManager>, BoxError> {
        Ok(Arc::new(RecordingStorageManager {
            journal: journal.clone(),
        }))
    })
}

/// Records each payload. Payloads starting with `flaky` fail on first
/// sight; payloads starting with `broken` always fail.
pub struct RecordingProcessor {
    journal: Journal,
    failed_once: Mutex<Vec<Vec<u8>>>,
}

impl RecordingProcessor {
    pub fn new(journal: &Journal) -> Self {
        Self {
            journal: journal.clone(),
            failed_once: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ScheduledTaskProcessor for RecordingProcessor {
    async fn process(&self, task: &ScheduledTask) -> Result<(), BoxError> {
        if task.payload.starts_with(b"broken") {
            return Err("permanent failure".into());
        }
        if task.payload.starts_with(b"flaky") {
            let mut failed = self.failed_once.lock().unwrap();
            if !failed.contains(&task.payload) {
                failed.push(task.payload.clone());
                return Err("transient failure".into());
            }
        }
        self.journal.record(format!(
            "task:{}:{}",
            task.shard_index,
            String::from_utf8_lossy(&task.payload)
        ));
        Ok(())
    }
}

pub fn task_processor_factory(journal: &Journal) -> TaskProcessorFactory {
    let journal = journal.clone();
    Arc::new(
        move |_group: &str, _ctx: &ServiceContext| -> Result<Arc<dyn ScheduledTaskProcessor>, BoxError> {
            Ok(Arc::new(RecordingProcessor::new(&journal)))
        },
    )
}

/// Poll `check` until it holds or the timeout elapses.
pub async fn eventually(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
