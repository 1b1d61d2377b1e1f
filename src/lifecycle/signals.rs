//! OS signal handling.
//!
//! SIGINT (Ctrl-C) and, on unix, SIGTERM start the drain. A second signal
//! is logged and otherwise ignored; the drain deadline bounds shutdown.

use crate::lifecycle::ShutdownCoordinator;

/// Wait for the first termination signal.
pub async fn termination() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!(signal = "SIGINT", "Shutdown signal received"),
        _ = terminate => tracing::info!(signal = "SIGTERM", "Shutdown signal received"),
    }
}

/// Spawn a listener that begins the drain on the first termination signal.
pub fn install(shutdown: &ShutdownCoordinator) {
    let shutdown = shutdown.clone();
    tokio::spawn(async move {
        termination().await;
        shutdown.begin_drain();

        termination().await;
        tracing::warn!("Second shutdown signal received, still draining");
    });
}
