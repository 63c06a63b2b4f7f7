//! Shutdown coordination.

use tokio::sync::broadcast;

/// Fan-out stop signal for long-running tasks.
///
/// Used for the HTTP server (stop accepting, drain) and the health checker
/// loop. Receivers also observe the sender being dropped as a stop.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Signal every current subscriber. Returns how many were listening.
    pub fn trigger(&self) -> usize {
        self.tx.send(()).unwrap_or(0)
    }

    /// Tasks still subscribed.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolves once `receiver` is signalled or its sender is gone.
pub async fn wait(mut receiver: broadcast::Receiver<()>) {
    let _ = receiver.recv().await;
}
