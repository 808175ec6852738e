//! Request-port listener with a connection cap.
//!
//! Each accepted stream carries a [`ConnectionPermit`]; once `max_connections`
//! permits are out, `accept` parks until a connection closes.

use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::ServerConfig;

#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("cannot bind request port: {0}")]
    Bind(#[source] std::io::Error),

    #[error("accept failed: {0}")]
    Accept(#[source] std::io::Error),
}

pub struct Listener {
    socket: TcpListener,
    slots: Arc<Semaphore>,
}

impl Listener {
    pub async fn bind(config: &ServerConfig) -> Result<Self, ListenerError> {
        let socket = TcpListener::bind(config.bind_address())
            .await
            .map_err(ListenerError::Bind)?;
        let address = socket.local_addr().map_err(ListenerError::Bind)?;
        tracing::info!(%address, max_connections = config.max_connections, "Request port bound");

        Ok(Self {
            socket,
            slots: Arc::new(Semaphore::new(config.max_connections)),
        })
    }

    /// Wait for a free slot, then for a client.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr, ConnectionPermit), ListenerError> {
        let slot = Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .map_err(|e| ListenerError::Accept(std::io::Error::other(e)))?;
        let (stream, peer) = self.socket.accept().await.map_err(ListenerError::Accept)?;
        tracing::trace!(%peer, free_slots = self.slots.available_permits(), "Client accepted");
        Ok((stream, peer, ConnectionPermit { _slot: slot }))
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn free_slots(&self) -> usize {
        self.slots.available_permits()
    }
}

/// Held for the life of a connection; dropping it frees the slot.
#[derive(Debug)]
pub struct ConnectionPermit {
    _slot: OwnedSemaphorePermit,
}
