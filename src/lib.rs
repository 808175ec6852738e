//! Bootstrap and lifecycle core for sharded key-value services.
//!
//! A concrete service supplies a [`ServiceConfig`] of factories (request
//! handler, optional consumers, producers, storage manager, task
//! processors); [`Bootstrap::launch`] assembles them around a partitioned
//! storage engine and starts listening, and [`Bootstrap::shutdown`] tears
//! everything down in reverse order.

// Building blocks
pub mod config;
pub mod migration;
pub mod sharding;
pub mod storage;

// Optional components
pub mod bus;
pub mod tasks;

// Serving
pub mod handler;
pub mod http;
pub mod net;

// Cross-cutting concerns
pub mod error;
pub mod lifecycle;
pub mod observability;

pub mod bootstrap;

pub use bootstrap::{Bootstrap, ServiceConfig, ServiceContext, ShutdownReport};
pub use config::PipelineConfig;
pub use error::{BootstrapError, BoxError};
pub use handler::{HandlerMode, RequestHandler};
pub use lifecycle::Shutdown;
