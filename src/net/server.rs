//! Request server: accept loop and per-connection tasks.
//!
//! # Responsibilities
//! - Run the accept loop on a background task
//! - Vend a handler per connection via [`HandlerBuilder`]
//! - Stop accepting on shutdown, signal open connections, wait for them

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::config::ServerConfig;
use crate::handler::HandlerBuilder;
use crate::lifecycle::{Shutdown, ShutdownListener};
use crate::net::connection::{Connection, ConnectionGuard, ConnectionTracker};
use crate::net::listener::{ConnectionPermit, Listener, ListenerError};
use crate::observability::metrics;

/// Back-off after a failed accept, so a full fd table does not spin the loop.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(50);

/// The request server. Bound once every other component has started.
pub struct PipelineServer {
    local_addr: SocketAddr,
    idle_timeout: Duration,
    listener: Option<Listener>,
    shutdown: Shutdown,
    tracker: ConnectionTracker,
    accept_task: Option<JoinHandle<()>>,
}

impl PipelineServer {
    /// Bind the listener. Connections wait in the backlog until `start`.
    pub async fn bind(config: &ServerConfig) -> Result<Self, ListenerError> {
        let listener = Listener::bind(config).await?;
        let local_addr = listener.local_addr().map_err(ListenerError::Bind)?;
        Ok(Self {
            local_addr,
            idle_timeout: Duration::from_millis(config.idle_timeout_ms),
            listener: Some(listener),
            shutdown: Shutdown::new(),
            tracker: ConnectionTracker::new(),
            accept_task: None,
        })
    }

    /// Begin accepting connections. A second call is a no-op.
    pub fn start(&mut self, handlers: Arc<HandlerBuilder>) {
        let Some(listener) = self.listener.take() else {
            tracing::warn!("Request server already started");
            return;
        };
        self.accept_task = Some(tokio::spawn(accept_loop(
            listener,
            handlers,
            self.idle_timeout,
            self.tracker.clone(),
            self.shutdown.clone(),
        )));
        tracing::info!(address = %self.local_addr, "Request server listening");
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn active_connections(&self) -> u64 {
        self.tracker.active_count()
    }

    /// Stop accepting, close open connections and wait for them to finish.
    pub async fn stop(self) {
        self.shutdown.trigger();
        if let Some(task) = self.accept_task {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Accept loop ended abnormally");
            }
        }
        drop(self.listener);
        tracing::info!(
            open_connections = self.tracker.active_count(),
            "Waiting for connections to close"
        );
        self.tracker.wait_for_drain().await;
        tracing::info!("Request server stopped");
    }
}

async fn accept_loop(
    listener: Listener,
    handlers: Arc<HandlerBuilder>,
    idle_timeout: Duration,
    tracker: ConnectionTracker,
    shutdown: Shutdown,
) {
    let mut stop = shutdown.subscribe();
    loop {
        tokio::select! {
            _ = stop.recv() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer, permit)) => {
                    // Tracked before spawning so a concurrent stop waits for it.
                    let connection = Connection::new(stream, peer, idle_timeout);
                    let guard = tracker.track(connection.id());
                    tokio::spawn(serve_connection(
                        connection,
                        permit,
                        guard,
                        Arc::clone(&handlers),
                        shutdown.subscribe(),
                    ));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Accept failed");
                    metrics::record_connection_error("accept");
                    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                }
            },
        }
    }
    tracing::debug!("Accept loop stopped");
}

async fn serve_connection(
    mut connection: Connection,
    permit: ConnectionPermit,
    guard: ConnectionGuard,
    handlers: Arc<HandlerBuilder>,
    mut shutdown: ShutdownListener,
) {
    let id = connection.id();
    let peer = connection.peer_addr();

    let handler = match handlers.new_handler() {
        Ok(handler) => handler,
        Err(e) => {
            tracing::warn!(connection_id = %id, peer = %peer, error = %e, "Handler construction failed, dropping connection");
            metrics::record_connection_error("handler_factory");
            return;
        }
    };

    metrics::record_connection_opened();
    tracing::debug!(connection_id = %id, peer = %peer, "Connection opened");

    tokio::select! {
        result = handler.handle_connection(&mut connection) => {
            if let Err(e) = result {
                tracing::debug!(connection_id = %id, error = %e, "Connection ended with error");
                metrics::record_connection_error("handler");
            }
        }
        _ = shutdown.recv() => {
            tracing::debug!(connection_id = %id, "Closing connection for shutdown");
        }
    }

    handler.connection_closed();
    metrics::record_connection_closed();
    drop(connection);
    drop(permit);
    drop(guard);
}
