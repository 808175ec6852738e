//! Request-handler construction strategy.
//!
//! # Data Flow
//! ```text
//! accepted connection
//!     → HandlerBuilder::new_handler
//!         Singleton:     shared instance built once at assembly
//!         PerConnection: factory invoked for this connection
//!     → connection_opened()
//!     → handle_connection(&mut Connection)   (wire protocol lives here)
//!     → connection_closed()
//! ```
//!
//! # Design Decisions
//! - The singleton is built on the control task during assembly, so no
//!   construction race is possible; its state must tolerate concurrent use
//! - Per-connection handlers may keep connection-scoped state (transactions)

pub mod line;

use async_trait::async_trait;
use std::sync::Arc;

use crate::bootstrap::ServiceContext;
use crate::error::{BootstrapError, BoxError};
use crate::net::connection::Connection;

pub use line::LineHandler;

/// Pluggable request-handling logic of a concrete service.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    /// Called on every vended instance before first use.
    fn connection_opened(&self) {}

    /// Serve one client connection until it closes.
    async fn handle_connection(&self, connection: &mut Connection) -> Result<(), BoxError>;

    /// Called after `handle_connection` returns.
    fn connection_closed(&self) {}
}

/// Builds a handler with access to the assembled components.
pub type HandlerFactory =
    Arc<dyn Fn(&ServiceContext) -> Result<Arc<dyn RequestHandler>, BoxError> + Send + Sync>;

/// How handler instances are vended to connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HandlerMode {
    /// One shared instance for every connection.
    #[default]
    Singleton,
    /// A fresh instance per connection.
    PerConnection,
}

enum Strategy {
    Singleton(Arc<dyn RequestHandler>),
    PerConnection {
        factory: HandlerFactory,
        context: Arc<ServiceContext>,
    },
}

/// Vends handlers to new connections according to a [`HandlerMode`].
pub struct HandlerBuilder {
    strategy: Strategy,
}

impl HandlerBuilder {
    /// In singleton mode the handler is built here; a factory error is fatal.
    pub fn new(
        mode: HandlerMode,
        factory: HandlerFactory,
        context: Arc<ServiceContext>,
    ) -> Result<Self, BootstrapError> {
        let strategy = match mode {
            HandlerMode::Singleton => {
                let handler =
                    factory(&context).map_err(|e| BootstrapError::factory("request handler", e))?;
                Strategy::Singleton(handler)
            }
            HandlerMode::PerConnection => Strategy::PerConnection { factory, context },
        };
        tracing::info!(mode = ?mode, "Request handler strategy ready");
        Ok(Self { strategy })
    }

    pub fn mode(&self) -> HandlerMode {
        match self.strategy {
            Strategy::Singleton(_) => HandlerMode::Singleton,
            Strategy::PerConnection { .. } => HandlerMode::PerConnection,
        }
    }

    /// Handler for a new connection, already notified via `connection_opened`.
    pub fn new_handler(&self) -> Result<Arc<dyn RequestHandler>, BoxError> {
        let handler = match &self.strategy {
            Strategy::Singleton(handler) => Arc::clone(handler),
            Strategy::PerConnection { factory, context } => factory(context)?,
        };
        handler.connection_opened();
        Ok(handler)
    }
}
