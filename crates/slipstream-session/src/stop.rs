//! Cooperative cancellation for a running session.
//!
//! The caller keeps the [`StopHandle`]; the session watches the paired
//! [`StopSignal`] from its select loop, so a requested stop is observed
//! within one keep-alive interval at worst.

use std::sync::Arc;

use tokio::sync::watch;

/// Creates a connected stop handle/signal pair.
pub fn stop_pair() -> (StopHandle, StopSignal) {
    let (tx, rx) = watch::channel(false);
    (StopHandle { tx: Arc::new(tx) }, StopSignal { rx })
}

/// Caller-side handle. Cloneable; any clone can request the stop.
#[derive(Debug, Clone)]
pub struct StopHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl StopHandle {
    /// Requests a stop. Idempotent; safe to call from any task.
    pub fn stop(&self) {
        // An absent receiver just means nothing is running to observe it.
        let _ = self.tx.send(true);
    }
}

/// Session-side signal.
#[derive(Debug, Clone)]
pub struct StopSignal {
    rx: watch::Receiver<bool>,
}

impl StopSignal {
    /// `true` once a stop has been requested.
    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves when a stop is requested. If every handle is dropped
    /// without stopping, no stop can ever arrive and this pends forever —
    /// the session then runs to its natural end.
    pub async fn cancelled(&mut self) {
        loop {
            if *self.rx.borrow() {
                return;
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stop_is_observed() {
        let (handle, mut signal) = stop_pair();
        assert!(!signal.is_stopped());

        handle.stop();

        assert!(signal.is_stopped());
        signal.cancelled().await; // must resolve immediately
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let (handle, mut signal) = stop_pair();
        handle.stop();
        handle.stop();
        signal.cancelled().await;
        assert!(signal.is_stopped());
    }

    #[tokio::test]
    async fn test_cloned_handle_stops_all_signals() {
        let (handle, mut signal) = stop_pair();
        let mut other = signal.clone();

        handle.clone().stop();

        signal.cancelled().await;
        other.cancelled().await;
    }

    #[tokio::test]
    async fn test_dropped_handle_never_resolves() {
        let (handle, mut signal) = stop_pair();
        drop(handle);

        let resolved = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            signal.cancelled(),
        )
        .await;
        assert!(resolved.is_err(), "cancelled() must pend after handle drop");
    }
}
