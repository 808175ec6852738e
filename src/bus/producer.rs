//! Producer contract.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::bootstrap::ServiceContext;
use crate::bus::ProducerConfig;
use crate::error::BoxError;

/// Outbound publisher for one canonical topic.
#[async_trait]
pub trait Producer: Send + Sync {
    /// Physical topic name.
    fn topic(&self) -> &str;

    async fn send(&self, key: Option<&[u8]>, payload: &[u8]) -> Result<(), BoxError>;

    /// Flush pending messages and release the producer.
    async fn destroy(&self) -> Result<(), BoxError>;
}

/// Producers keyed by canonical topic name.
pub type ProducerMap = BTreeMap<String, Arc<dyn Producer>>;

#[derive(Debug, Clone)]
pub struct ProducerSpec {
    pub canonical: String,
    pub topic: String,
    pub brokers: Vec<String>,
    pub config: ProducerConfig,
}

pub type ProducerFactory = Arc<
    dyn Fn(&ProducerSpec, &ServiceContext) -> Result<Arc<dyn Producer>, BoxError> + Send + Sync,
>;
