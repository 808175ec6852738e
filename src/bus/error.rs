use thiserror::Error;

use crate::error::BoxError;
use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("invalid consumer configuration: {0}")]
    ConsumerConfig(#[source] serde_json::Error),

    #[error("invalid producer configuration: {0}")]
    ProducerConfig(#[source] serde_json::Error),

    /// Topics are referenced but no producer factory was registered.
    #[error("no producer factory registered for topics: {}", .0.join(", "))]
    MissingProducerFactory(Vec<String>),

    #[error("failed to build {component}: {source}")]
    Factory {
        component: String,
        #[source]
        source: BoxError,
    },

    #[error("consumer '{consumer}' failed verification: {source}")]
    Verify {
        consumer: String,
        #[source]
        source: BoxError,
    },

    #[error("consumer '{consumer}' failed to start: {source}")]
    Start {
        consumer: String,
        #[source]
        source: BoxError,
    },

    #[error("offset store error: {0}")]
    Offsets(#[from] StorageError),
}
