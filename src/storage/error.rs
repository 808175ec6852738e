//! Storage error type.

use std::path::PathBuf;
use thiserror::Error;

use crate::sharding::ShardingError;

/// Errors raised while opening, using or closing the storage engine.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Error reported by the storage engine.
    #[error("storage engine error: {0}")]
    Engine(#[from] fjall::Error),

    /// Filesystem error while preparing data directories.
    #[error("storage io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Multi-path specification is not valid.
    #[error("invalid storage paths specification: {0}")]
    InvalidPaths(String),

    /// Neither a primary path nor a multi-path entry was configured.
    #[error("no storage path configured")]
    NoPath,

    /// The data directory does not exist and creation is not allowed.
    #[error("storage not found at {0} and create_if_missing is disabled")]
    MissingStore(PathBuf),

    /// A group partition does not exist and creation is not allowed.
    #[error("partition '{0}' does not exist and creation is not allowed")]
    MissingPartition(String),

    /// Lookup of a partition that was never opened.
    #[error("partition not found: {0}")]
    UnknownPartition(String),

    /// A group is configured to be both opened and dropped, or shadows a
    /// system partition.
    #[error("conflicting partition group '{0}'")]
    GroupConflict(String),

    /// The persisted version timestamp has an unexpected encoding.
    #[error("corrupt version timestamp: expected 8 bytes, found {0}")]
    CorruptVersion(usize),

    /// A stored integer (offset, counter) has an unexpected encoding.
    #[error("corrupt value at '{key}': expected 8 bytes, found {len}")]
    CorruptValue { key: String, len: usize },

    /// Shard-group specification error surfaced through storage.
    #[error(transparent)]
    Sharding(#[from] ShardingError),
}
