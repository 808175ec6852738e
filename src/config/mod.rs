//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → command-line overrides (binary)
//!     → validation.rs (semantic checks)
//!     → PipelineConfig (validated, immutable)
//!     → handed to the bootstrap by value
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Shard-group, path and bus specifications stay strings here and are
//!   parsed by the subsystem that owns their format

pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::BusConfig;
pub use schema::HttpConfig;
pub use schema::LogFormat;
pub use schema::ObservabilityConfig;
pub use schema::PipelineConfig;
pub use schema::ServerConfig;
pub use schema::StorageConfig;
pub use schema::TaskConfig;
