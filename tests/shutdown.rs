//! Graceful shutdown against a real listener.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;

use movie_api::lifecycle::{BackgroundTasks, Phase, ShutdownCoordinator, ShutdownError};
use movie_api::notify::LogNotifier;
use movie_api::storage::MemoryStorage;
use movie_api::HttpServer;

mod common;

async fn start(
    shutdown: &ShutdownCoordinator,
) -> (String, tokio::task::JoinHandle<Result<(), ShutdownError>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let server = HttpServer::new(
        &common::test_config(),
        Arc::new(MemoryStorage::new()),
        Arc::new(LogNotifier),
        shutdown.clone(),
    );
    let handle = tokio::spawn(server.run(listener));
    (base, handle)
}

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .timeout(Duration::from_secs(1))
        .build()
        .unwrap()
}

#[tokio::test]
async fn waits_for_background_work_before_stopping() {
    let shutdown = ShutdownCoordinator::new(
        BackgroundTasks::new(),
        Duration::from_secs(2),
        Some(Duration::from_secs(10)),
    );
    let (base, handle) = start(&shutdown).await;

    let res = client()
        .get(format!("{base}/v1/healthcheck"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);

    let guard = shutdown.tasks().track("queued_mail");
    shutdown.begin_drain();

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(shutdown.phase(), Phase::Draining);
    assert!(!handle.is_finished());

    // No new requests once draining.
    assert!(client()
        .get(format!("{base}/v1/healthcheck"))
        .send()
        .await
        .is_err());

    drop(guard);
    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
    assert!(result.is_ok());
    assert_eq!(shutdown.phase(), Phase::Stopped);
}

#[tokio::test]
async fn abandoned_work_is_reported() {
    let shutdown = ShutdownCoordinator::new(
        BackgroundTasks::new(),
        Duration::from_secs(2),
        Some(Duration::from_millis(300)),
    );
    let (_base, handle) = start(&shutdown).await;

    let _stuck = shutdown.tasks().track("stuck_mail");
    shutdown.begin_drain();

    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(
        result,
        Err(ShutdownError::PendingWorkTimeout { remaining: 1, .. })
    ));
    assert_eq!(shutdown.phase(), Phase::Draining);
}
