//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::connect_info::MockConnectInfo;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use movie_api::config::ApiConfig;
use movie_api::lifecycle::{BackgroundTasks, ShutdownCoordinator};
use movie_api::notify::{Notifier, NotifyError};
use movie_api::security::token::{Token, TokenHash, TokenScope};
use movie_api::storage::{
    MemoryStorage, Movie, NewMovie, NewUser, Permissions, Storage, StorageError, User,
};
use movie_api::HttpServer;

pub const CLIENT_ADDR: &str = "203.0.113.7:51000";

/// Notifier that remembers every message instead of delivering it.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, String, Value)>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<(String, String, Value)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, recipient: &str, template: &str, data: Value) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .unwrap()
            .push((recipient.to_string(), template.to_string(), data));
        Ok(())
    }
}

/// An in-process app with handles to its collaborators.
pub struct TestApp {
    pub router: Router,
    pub storage: MemoryStorage,
    pub notifier: Arc<RecordingNotifier>,
    pub shutdown: ShutdownCoordinator,
}

/// Defaults with the limiter loose enough not to interfere.
pub fn test_config() -> ApiConfig {
    let mut config = ApiConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.listener.environment = "testing".into();
    config.limiter.requests_per_second = 100.0;
    config.limiter.burst = 100;
    config
}

pub fn spawn_app(config: ApiConfig) -> TestApp {
    let storage = MemoryStorage::new();
    spawn_app_with(config, storage.clone(), Arc::new(storage))
}

/// Like [`spawn_app`], but handlers talk to `backend`; `storage` is the
/// table it wraps, for seeding and inspection.
pub fn spawn_app_with(config: ApiConfig, storage: MemoryStorage, backend: Arc<dyn Storage>) -> TestApp {
    let notifier = Arc::new(RecordingNotifier::default());
    let shutdown = ShutdownCoordinator::new(
        BackgroundTasks::new(),
        Duration::from_secs(5),
        Some(Duration::from_secs(5)),
    );
    let server = HttpServer::new(&config, backend, notifier.clone(), shutdown.clone());
    let addr: SocketAddr = CLIENT_ADDR.parse().unwrap();
    TestApp {
        router: server.router().layer(MockConnectInfo(addr)),
        storage,
        notifier,
        shutdown,
    }
}

/// The layered router with no peer address attached to requests.
pub fn router_without_peer(config: ApiConfig) -> Router {
    let shutdown = ShutdownCoordinator::new(BackgroundTasks::new(), Duration::from_secs(5), None);
    HttpServer::new(
        &config,
        Arc::new(MemoryStorage::new()),
        Arc::new(RecordingNotifier::default()),
        shutdown,
    )
    .router()
}

/// [`MemoryStorage`] with injectable latency and failures.
#[derive(Clone, Default)]
pub struct FaultyStorage {
    pub inner: MemoryStorage,
    /// Delay applied to `list_movies`.
    pub list_delay: Option<Duration>,
    /// While set, `insert_token` fails with a backend error.
    pub reject_tokens: Arc<AtomicBool>,
}

impl FaultyStorage {
    pub fn set_reject_tokens(&self, reject: bool) {
        self.reject_tokens.store(reject, Ordering::SeqCst);
    }
}

#[async_trait]
impl Storage for FaultyStorage {
    async fn get_user_for_token(&self, hash: &TokenHash, scope: TokenScope) -> Result<User, StorageError> {
        self.inner.get_user_for_token(hash, scope).await
    }

    async fn get_permissions(&self, user_id: i64) -> Result<Permissions, StorageError> {
        self.inner.get_permissions(user_id).await
    }

    async fn add_permissions(&self, user_id: i64, codes: &[&str]) -> Result<(), StorageError> {
        self.inner.add_permissions(user_id, codes).await
    }

    async fn insert_token(&self, token: &Token) -> Result<(), StorageError> {
        if self.reject_tokens.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("token table unavailable".into()));
        }
        self.inner.insert_token(token).await
    }

    async fn delete_tokens(&self, scope: TokenScope, user_id: i64) -> Result<(), StorageError> {
        self.inner.delete_tokens(scope, user_id).await
    }

    async fn insert_user(&self, user: NewUser) -> Result<User, StorageError> {
        self.inner.insert_user(user).await
    }

    async fn delete_user(&self, user_id: i64) -> Result<(), StorageError> {
        self.inner.delete_user(user_id).await
    }

    async fn get_user_by_email(&self, email: &str) -> Result<User, StorageError> {
        self.inner.get_user_by_email(email).await
    }

    async fn update_user(&self, user: &User) -> Result<User, StorageError> {
        self.inner.update_user(user).await
    }

    async fn list_movies(&self) -> Result<Vec<Movie>, StorageError> {
        if let Some(delay) = self.list_delay {
            tokio::time::sleep(delay).await;
        }
        self.inner.list_movies().await
    }

    async fn get_movie(&self, id: i64) -> Result<Movie, StorageError> {
        self.inner.get_movie(id).await
    }

    async fn insert_movie(&self, movie: NewMovie) -> Result<Movie, StorageError> {
        self.inner.insert_movie(movie).await
    }

    async fn delete_movie(&self, id: i64) -> Result<(), StorageError> {
        self.inner.delete_movie(id).await
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    pub fn error_code(&self) -> &str {
        self.body["error"]["code"].as_str().unwrap_or_default()
    }
}

/// Drive one request through the router.
pub async fn send(router: &Router, request: Request<Body>) -> TestResponse {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    TestResponse { status, headers, body }
}

pub fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::get(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

pub fn json(method: &str, uri: &str, body: Value, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// Insert a user directly, bypassing registration.
pub async fn seed_user(storage: &MemoryStorage, email: &str, activated: bool, perms: &[&str]) -> User {
    let user = storage
        .insert_user(NewUser {
            name: "Test User".into(),
            email: email.into(),
            password_hash: "unused".into(),
            activated,
        })
        .await
        .unwrap();
    if !perms.is_empty() {
        storage.add_permissions(user.id, perms).await.unwrap();
    }
    user
}

pub async fn issue_token(storage: &MemoryStorage, user_id: i64, scope: TokenScope) -> Token {
    let token = Token::generate(user_id, chrono::Duration::hours(1), scope).unwrap();
    storage.insert_token(&token).await.unwrap();
    token
}
