//! Session scope: one cancellation signal shared by every task a session
//! spawns.
//!
//! Cancelling the scope stops all of its tasks; dropping it aborts whatever
//! is left.

use std::future::Future;

use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Receiving side of a scope's cancellation signal.
#[derive(Clone)]
pub struct CancelSignal(watch::Receiver<bool>);

impl CancelSignal {
    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once the scope is cancelled or dropped.
    pub async fn cancelled(&mut self) {
        let _ = self.0.wait_for(|cancelled| *cancelled).await;
    }
}

/// Drive `fut` until it finishes or `signal` fires, whichever comes first.
pub async fn until_cancelled<F: Future<Output = ()>>(mut signal: CancelSignal, fut: F) {
    tokio::select! {
        biased;
        _ = signal.cancelled() => {}
        _ = fut => {}
    }
}

pub struct SessionScope {
    cancel: watch::Sender<bool>,
    tasks: JoinSet<()>,
}

impl SessionScope {
    pub fn new() -> Self {
        let (cancel, _) = watch::channel(false);
        Self {
            cancel,
            tasks: JoinSet::new(),
        }
    }

    pub fn signal(&self) -> CancelSignal {
        CancelSignal(self.cancel.subscribe())
    }

    /// Spawn `fut`, dropping it when the scope is cancelled.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<F>(&mut self, name: &'static str, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let signal = self.signal();
        self.tasks.spawn(async move {
            until_cancelled(signal, fut).await;
            debug!(task = name, "Scope task finished");
        });
    }

    /// Spawn a task that watches [`SessionScope::signal`] itself and winds
    /// down on its own.
    pub fn spawn_cooperative<F>(&mut self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tasks.spawn(fut);
    }

    /// Cancel the scope. Returns `true` on the first call only.
    pub fn cancel(&self) -> bool {
        self.cancel.send_if_modified(|cancelled| {
            if *cancelled {
                false
            } else {
                *cancelled = true;
                true
            }
        })
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// Number of tasks not yet joined.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Wait for every task spawned into the scope.
    pub async fn join(&mut self) {
        while let Some(result) = self.tasks.join_next().await {
            if let Err(e) = result
                && e.is_panic()
            {
                warn!(error = %e, "Scope task panicked");
            }
        }
    }
}

impl Default for SessionScope {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_cancel_stops_tasks() {
        let mut scope = SessionScope::new();
        let finished = Arc::new(AtomicBool::new(false));
        let flag = finished.clone();
        scope.spawn("sleeper", async move {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            flag.store(true, Ordering::SeqCst);
        });

        assert!(scope.cancel());
        assert!(!scope.cancel());
        tokio::time::timeout(Duration::from_secs(5), scope.join())
            .await
            .expect("scope did not wind down");

        assert!(scope.is_empty());
        assert!(scope.is_cancelled());
        assert!(!finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_cooperative_task_sees_signal() {
        let mut scope = SessionScope::new();
        let mut signal = scope.signal();
        let observed = Arc::new(AtomicBool::new(false));
        let flag = observed.clone();
        scope.spawn_cooperative(async move {
            signal.cancelled().await;
            flag.store(true, Ordering::SeqCst);
        });

        scope.cancel();
        scope.join().await;
        assert!(observed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_signal_fires_when_scope_dropped() {
        let scope = SessionScope::new();
        let mut signal = scope.signal();
        drop(scope);

        tokio::time::timeout(Duration::from_secs(1), signal.cancelled())
            .await
            .expect("signal did not fire");
        assert!(!signal.is_cancelled());
    }
}
