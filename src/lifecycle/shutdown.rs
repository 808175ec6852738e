//! Shutdown coordination for background workers.

use tokio::sync::watch;

/// Latched shutdown signal.
///
/// Backed by a watch channel so a listener created after `trigger` still
/// observes the signal.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: watch::Sender<bool>,
}

impl Shutdown {
    /// Create a new, untriggered signal.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> ShutdownListener {
        ShutdownListener {
            rx: self.tx.subscribe(),
        }
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    /// Whether the signal has been triggered.
    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving side of a [`Shutdown`].
#[derive(Debug, Clone)]
pub struct ShutdownListener {
    rx: watch::Receiver<bool>,
}

impl ShutdownListener {
    /// Resolve once shutdown has been triggered.
    pub async fn recv(&mut self) {
        // An error means the sender is gone, which also ends the worker.
        let _ = self.rx.wait_for(|triggered| *triggered).await;
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn late_listener_observes_trigger() {
        let shutdown = Shutdown::new();
        shutdown.trigger();
        let mut listener = shutdown.subscribe();
        tokio::time::timeout(Duration::from_secs(1), listener.recv())
            .await
            .expect("listener should resolve");
        assert!(listener.is_triggered());
    }

    #[tokio::test]
    async fn listener_waits_for_trigger() {
        let shutdown = Shutdown::new();
        let mut listener = shutdown.subscribe();
        assert!(tokio::time::timeout(Duration::from_millis(50), listener.recv()).await.is_err());
        shutdown.trigger();
        listener.recv().await;
        assert!(shutdown.is_triggered());
    }
}
