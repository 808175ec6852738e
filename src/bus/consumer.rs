//! Consumer contract and the helper shared by every consumer.

use async_trait::async_trait;
use fjall::PartitionHandle;
use std::sync::Arc;

use crate::bootstrap::ServiceContext;
use crate::bus::ConsumerConfig;
use crate::error::BoxError;
use crate::storage::StorageError;

/// Where a consumer resumes reading after `init`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OffsetPolicy {
    /// Resume from the offsets in the offset store.
    #[default]
    Stored,
    Beginning,
    End,
}

/// A message-bus consumer driven through verify → start → stop → destroy.
#[async_trait]
pub trait Consumer: Send + Sync {
    fn name(&self) -> &str;

    /// Connect and verify internal consistency. Must not process messages.
    async fn init(&self, policy: OffsetPolicy) -> Result<(), BoxError>;

    /// Begin the message loop.
    async fn start(&self) -> Result<(), BoxError>;

    /// Request the message loop to end. Must not block.
    fn stop(&self);

    /// Wait until the consumer has fully quiesced and release it.
    async fn destroy(&self) -> Result<(), BoxError>;
}

/// Everything a consumer factory receives about one configured consumer.
#[derive(Debug, Clone)]
pub struct ConsumerSpec {
    /// Configuration key the consumer was registered under.
    pub key: String,
    pub config: ConsumerConfig,
}

pub type ConsumerFactory = Arc<
    dyn Fn(&ConsumerSpec, &ServiceContext) -> Result<Arc<dyn Consumer>, BoxError> + Send + Sync,
>;

/// Shared consumer state: brokers, target version and the offset store.
#[derive(Clone)]
pub struct ConsumerHelper {
    brokers: Vec<String>,
    version_timestamp_ms: i64,
    offsets: PartitionHandle,
}

impl ConsumerHelper {
    pub fn new(brokers: Vec<String>, version_timestamp_ms: i64, offsets: PartitionHandle) -> Self {
        Self {
            brokers,
            version_timestamp_ms,
            offsets,
        }
    }

    pub fn brokers(&self) -> &[String] {
        &self.brokers
    }

    /// Target data version; consumers use it to decide replay behaviour.
    pub fn version_timestamp_ms(&self) -> i64 {
        self.version_timestamp_ms
    }

    /// Last committed offset of `(group, topic, partition)`.
    pub fn load_offset(&self, group: &str, topic: &str, partition: i32) -> Result<Option<i64>, StorageError> {
        let key = offset_key(group, topic, partition);
        let Some(bytes) = self.offsets.get(&key)? else {
            return Ok(None);
        };
        let raw: [u8; 8] = bytes
            .as_ref()
            .try_into()
            .map_err(|_| StorageError::CorruptValue { key, len: bytes.len() })?;
        Ok(Some(i64::from_be_bytes(raw)))
    }

    pub fn commit_offset(
        &self,
        group: &str,
        topic: &str,
        partition: i32,
        offset: i64,
    ) -> Result<(), StorageError> {
        self.offsets
            .insert(offset_key(group, topic, partition), offset.to_be_bytes().to_vec())?;
        Ok(())
    }
}

impl std::fmt::Debug for ConsumerHelper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsumerHelper")
            .field("brokers", &self.brokers)
            .field("version_timestamp_ms", &self.version_timestamp_ms)
            .finish_non_exhaustive()
    }
}

fn offset_key(group: &str, topic: &str, partition: i32) -> String {
    format!("{group}/{topic}/{partition}")
}
