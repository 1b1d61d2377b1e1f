//! Shutdown coordination for the service.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tokio::time;

use crate::config::ShutdownConfig;
use crate::lifecycle::BackgroundTasks;

/// Lifecycle phase of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Accepting connections and spawning background work.
    Running,
    /// No new connections; in-flight requests and background work finishing.
    Draining,
    /// HTTP drained and no background work left.
    Stopped,
}

#[derive(Debug, Error)]
pub enum ShutdownError {
    #[error("server error: {0}")]
    Server(#[from] std::io::Error),

    #[error("in-flight requests did not finish within {0:?}")]
    DrainTimeout(Duration),

    #[error("{remaining} background task(s) still pending after {timeout:?}")]
    PendingWorkTimeout { remaining: usize, timeout: Duration },
}

struct Inner {
    phase: watch::Sender<Phase>,
    tasks: BackgroundTasks,
    grace: Duration,
    pending_timeout: Option<Duration>,
}

/// Coordinator for graceful shutdown: `Running → Draining → Stopped`.
///
/// Long-running tasks observe [`draining`](Self::draining); the server loop
/// is driven through [`drive`](Self::drive).
#[derive(Clone)]
pub struct ShutdownCoordinator {
    inner: Arc<Inner>,
}

impl ShutdownCoordinator {
    /// Create a coordinator.
    ///
    /// `grace` bounds the HTTP drain; `pending_timeout` bounds the wait for
    /// background work (`None` waits indefinitely).
    pub fn new(tasks: BackgroundTasks, grace: Duration, pending_timeout: Option<Duration>) -> Self {
        let (phase, _) = watch::channel(Phase::Running);
        Self {
            inner: Arc::new(Inner {
                phase,
                tasks,
                grace,
                pending_timeout,
            }),
        }
    }

    pub fn from_config(tasks: BackgroundTasks, config: &ShutdownConfig) -> Self {
        Self::new(
            tasks,
            Duration::from_secs(config.grace_secs),
            config.pending_timeout_secs.map(Duration::from_secs),
        )
    }

    pub fn phase(&self) -> Phase {
        *self.inner.phase.borrow()
    }

    pub fn tasks(&self) -> &BackgroundTasks {
        &self.inner.tasks
    }

    /// Move from `Running` to `Draining`. Later calls are no-ops.
    pub fn begin_drain(&self) {
        let changed = self.inner.phase.send_if_modified(|phase| {
            if *phase == Phase::Running {
                *phase = Phase::Draining;
                true
            } else {
                false
            }
        });
        if changed {
            tracing::info!(
                grace = ?self.inner.grace,
                pending = self.inner.tasks.pending(),
                "Shutdown started, draining"
            );
        }
    }

    /// Resolves once the process has left `Running`.
    pub async fn draining(&self) {
        let mut rx = self.inner.phase.subscribe();
        let _ = rx.wait_for(|phase| *phase != Phase::Running).await;
    }

    /// Drive `server` to completion under the shutdown state machine.
    ///
    /// `server` must itself stop accepting once [`draining`](Self::draining)
    /// resolves (e.g. via `axum::serve(..).with_graceful_shutdown`). After
    /// the drain starts it gets `grace` to finish in-flight requests, then
    /// background work is awaited. `Stopped` is reached only when both are done.
    pub async fn drive<S>(&self, server: S) -> Result<(), ShutdownError>
    where
        S: Future<Output = std::io::Result<()>>,
    {
        tokio::pin!(server);

        let drained = tokio::select! {
            result = &mut server => {
                // Server exited on its own; nothing left to accept either way.
                self.begin_drain();
                result.map_err(ShutdownError::from)
            }
            _ = self.draining() => {
                match time::timeout(self.inner.grace, &mut server).await {
                    Ok(result) => result.map_err(ShutdownError::from),
                    Err(_) => {
                        tracing::error!(grace = ?self.inner.grace, "HTTP drain timed out, cutting off in-flight requests");
                        Err(ShutdownError::DrainTimeout(self.inner.grace))
                    }
                }
            }
        };

        tracing::info!(pending = self.inner.tasks.pending(), "Completing background jobs");
        self.wait_for_background().await?;

        self.inner.phase.send_replace(Phase::Stopped);
        tracing::info!("Shutdown complete");
        drained
    }

    async fn wait_for_background(&self) -> Result<(), ShutdownError> {
        let tasks = &self.inner.tasks;
        match self.inner.pending_timeout {
            None => {
                tasks.wait_idle().await;
                Ok(())
            }
            Some(timeout) => match time::timeout(timeout, tasks.wait_idle()).await {
                Ok(()) => Ok(()),
                Err(_) => {
                    let remaining = tasks.pending();
                    tracing::error!(
                        remaining,
                        ?timeout,
                        "Abandoning background tasks that did not finish in time"
                    );
                    Err(ShutdownError::PendingWorkTimeout { remaining, timeout })
                }
            },
        }
    }
}
