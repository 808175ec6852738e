//! Crate-level error type for assembling and running a pipeline service.

use thiserror::Error;

use crate::bus::BusError;
use crate::config::loader::ConfigError;
use crate::net::listener::ListenerError;
use crate::sharding::ShardingError;
use crate::storage::StorageError;
use crate::tasks::TaskError;

/// Error type returned by pluggable factories and collaborators.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Fatal startup errors. The binary logs them and exits non-zero.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("shard group configuration error: {0}")]
    Sharding(#[from] ShardingError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Bus(#[from] BusError),

    #[error(transparent)]
    Task(#[from] TaskError),

    #[error("listener error: {0}")]
    Listener(#[from] ListenerError),

    /// A construction strategy failed to produce its component.
    #[error("failed to build {component}: {source}")]
    Factory {
        component: String,
        #[source]
        source: BoxError,
    },

    /// A starting component reported failure.
    #[error("failed to start {component}: {source}")]
    Start {
        component: String,
        #[source]
        source: BoxError,
    },

    /// A task processor references a group that is not configured.
    #[error("unknown partition group '{0}'")]
    UnknownPartitionGroup(String),

    /// The health / metrics endpoint could not bind.
    #[error("health endpoint error: {0}")]
    Endpoint(#[source] std::io::Error),
}

impl BootstrapError {
    pub(crate) fn factory(component: impl Into<String>, source: BoxError) -> Self {
        Self::Factory {
            component: component.into(),
            source,
        }
    }
}
