//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, ports distinct)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: PipelineConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;

use crate::config::schema::PipelineConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    pub message: String,
}

/// Check a configuration, collecting every problem.
pub fn validate_config(config: &PipelineConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut fail = |field: &'static str, message: &str| {
        errors.push(ValidationError {
            field,
            message: message.to_string(),
        })
    };

    let storage = &config.storage;
    if storage.path.trim().is_empty() && storage.paths.trim().is_empty() {
        fail("storage.path", "a primary path or storage.paths is required");
    }
    if storage.parallelism == 0 {
        fail("storage.parallelism", "must be at least 1");
    }
    if storage.block_cache_size_mb == 0 {
        fail("storage.block_cache_size_mb", "must be at least 1");
    }
    if storage.version_timestamp_ms < 0 {
        fail("storage.version_timestamp_ms", "must not be negative");
    }

    if config.server.idle_timeout_ms == 0 {
        fail("server.idle_timeout_ms", "must be greater than 0");
    }
    if config.server.max_connections == 0 {
        fail("server.max_connections", "must be at least 1");
    }
    if config.http.enabled && config.http.port != 0 && config.http.port == config.server.port {
        fail("http.port", "must differ from server.port");
    }

    if config.tasks.poll_interval_ms == 0 {
        fail("tasks.poll_interval_ms", "must be greater than 0");
    }
    if config.tasks.batch_size == 0 {
        fail("tasks.batch_size", "must be at least 1");
    }

    let level = config.observability.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        fail("observability.log_level", "unknown log level");
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
