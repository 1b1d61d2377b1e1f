//! Tracking of detached background work.
//!
//! # Responsibilities
//! - Count in-flight background tasks (notifications, sweeps)
//! - Keep the count exact on success, error and panic
//! - Let shutdown wait for the count to reach zero

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures_util::FutureExt;
use tokio::sync::Notify;

use crate::observability::metrics;

#[derive(Debug, Default)]
struct Counter {
    pending: AtomicUsize,
    idle: Notify,
}

/// Registry of outstanding background work. Clones share one counter.
#[derive(Debug, Clone, Default)]
pub struct BackgroundTasks {
    inner: Arc<Counter>,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one unit of work. The returned guard decrements on drop.
    pub fn track(&self, name: &'static str) -> WorkGuard {
        let pending = self.inner.pending.fetch_add(1, Ordering::SeqCst) + 1;
        metrics::record_pending_tasks(pending);
        WorkGuard {
            counter: Arc::clone(&self.inner),
            name,
        }
    }

    /// Spawn `future` as a tracked task.
    ///
    /// The task is detached from any request: it keeps running after the
    /// response is sent, and shutdown waits for it. A panic inside the task
    /// is caught and logged.
    pub fn spawn<F>(&self, name: &'static str, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let guard = self.track(name);
        tokio::spawn(async move {
            let _guard = guard;
            match AssertUnwindSafe(future).catch_unwind().await {
                Ok(()) => metrics::record_background_task(name, "completed"),
                Err(panic) => {
                    tracing::error!(
                        task = name,
                        panic = %crate::http::panic::panic_message(&*panic),
                        "Background task panicked"
                    );
                    metrics::record_background_task(name, "panicked");
                }
            }
        });
    }

    /// Number of tasks still running.
    pub fn pending(&self) -> usize {
        self.inner.pending.load(Ordering::SeqCst)
    }

    /// Wait until no tracked work remains.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.pending() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Guard for one unit of tracked work.
#[derive(Debug)]
pub struct WorkGuard {
    counter: Arc<Counter>,
    name: &'static str,
}

impl Drop for WorkGuard {
    fn drop(&mut self) {
        let remaining = self.counter.pending.fetch_sub(1, Ordering::SeqCst) - 1;
        metrics::record_pending_tasks(remaining);
        tracing::trace!(task = self.name, remaining, "Background work finished");
        if remaining == 0 {
            self.counter.idle.notify_waiters();
        }
    }
}
