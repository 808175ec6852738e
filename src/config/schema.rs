//! Configuration schema definitions.
//!
//! This module defines the runtime parameters of a pipeline service.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for a pipeline service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct PipelineConfig {
    /// Storage engine location, partitions and tuning.
    pub storage: StorageConfig,

    /// Message-bus brokers and consumer/producer specifications.
    pub bus: BusConfig,

    /// Request server listener.
    pub server: ServerConfig,

    /// Health and metrics endpoint.
    pub http: HttpConfig,

    /// Scheduled-task queue polling.
    pub tasks: TaskConfig,

    /// Logging settings.
    pub observability: ObservabilityConfig,
}

/// Storage engine configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Primary data directory.
    pub path: String,

    /// JSON array of `{"path", "target_size"}` entries.
    pub paths: String,

    /// Shard groups to open (`name:start:count:increment,...`).
    pub groups: String,

    /// Shard groups whose partitions are dropped.
    pub drop_groups: String,

    /// Background flush/compaction workers.
    pub parallelism: usize,

    /// Shared block cache budget in megabytes.
    pub block_cache_size_mb: u64,

    /// Create the store and missing partitions.
    pub create_if_missing: bool,

    /// Create missing partitions once, gated by `version_timestamp_ms`.
    pub create_if_missing_one_off: bool,

    /// Target data version in milliseconds since the epoch (0 = none).
    pub version_timestamp_ms: i64,

    /// Whether this replica is the master, forwarded to the storage manager.
    pub master_replica: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: "data/pipeline".to_string(),
            paths: String::new(),
            groups: String::new(),
            drop_groups: String::new(),
            parallelism: 4,
            block_cache_size_mb: 512,
            create_if_missing: true,
            create_if_missing_one_off: false,
            version_timestamp_ms: 0,
            master_replica: true,
        }
    }
}

/// Message-bus configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct BusConfig {
    /// Comma-separated broker addresses.
    pub brokers: String,

    /// JSON object: configuration key → consumer config (or array of them).
    pub consumers: String,

    /// JSON object: canonical topic → producer config.
    pub producers: String,
}

/// Request server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind host.
    pub host: String,

    /// Listening port (0 picks an ephemeral port).
    pub port: u16,

    /// Close a connection after this long without client data.
    pub idle_timeout_ms: u64,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 6379,
            idle_timeout_ms: 300_000,
            max_connections: 10_000,
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Health / metrics endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Serve `/health` and `/metrics`.
    pub enabled: bool,

    /// Bind host.
    pub host: String,

    /// Listening port (0 picks an ephemeral port).
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "0.0.0.0".to_string(),
            port: 9090,
        }
    }
}

impl HttpConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Scheduled-task queue configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TaskConfig {
    /// Delay between polls of each queue.
    pub poll_interval_ms: u64,

    /// Maximum due tasks taken from one partition per poll.
    pub batch_size: usize,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            batch_size: 128,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}
