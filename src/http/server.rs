//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with all handlers
//! - Wire up the admission pipeline around it
//! - Bind the server to a listener and drive it through shutdown
//!
//! # Layer order (outermost first)
//! ```text
//! panic guard → request id → trace → metrics → timeout → body limit
//!     → CORS → authenticate → rate limit → [route: authorize] → handler
//! ```

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::error_handling::HandleErrorLayer;
use axum::extract::DefaultBodyLimit;
use axum::{middleware, BoxError, Router};
use tokio::net::TcpListener;
use tower::timeout::{error::Elapsed, TimeoutLayer};
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::api;
use crate::config::{ApiConfig, TokenConfig};
use crate::http::error::ApiError;
use crate::http::panic::panic_guard;
use crate::http::request::{request_span, X_REQUEST_ID};
use crate::lifecycle::{BackgroundTasks, ShutdownCoordinator, ShutdownError};
use crate::notify::Notifier;
use crate::observability::metrics;
use crate::security::authentication::{authenticate, Authenticator};
use crate::security::headers::cors_layer;
use crate::security::rate_limit::{rate_limit_middleware, RateLimiter};
use crate::storage::Storage;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub notifier: Arc<dyn Notifier>,
    pub tasks: BackgroundTasks,
    pub tokens: TokenConfig,
    pub environment: Arc<str>,
}

/// HTTP server for the API.
pub struct HttpServer {
    router: Router,
    limiter: RateLimiter,
    shutdown: ShutdownCoordinator,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(
        config: &ApiConfig,
        storage: Arc<dyn Storage>,
        notifier: Arc<dyn Notifier>,
        shutdown: ShutdownCoordinator,
    ) -> Self {
        let state = AppState {
            storage: storage.clone(),
            notifier,
            tasks: shutdown.tasks().clone(),
            tokens: config.tokens.clone(),
            environment: Arc::from(config.listener.environment.as_str()),
        };
        let limiter = RateLimiter::new(&config.limiter);
        let authenticator = Authenticator::new(storage);

        let router = Self::build_router(config, state, authenticator, limiter.clone());
        Self {
            router,
            limiter,
            shutdown,
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(
        config: &ApiConfig,
        state: AppState,
        authenticator: Authenticator,
        limiter: RateLimiter,
    ) -> Router {
        api::routes(state)
            .layer(middleware::from_fn_with_state(limiter, rate_limit_middleware))
            .layer(middleware::from_fn_with_state(authenticator, authenticate))
            .layer(cors_layer(&config.cors))
            .layer(DefaultBodyLimit::max(config.security.max_body_size))
            .layer(
                ServiceBuilder::new()
                    .layer(HandleErrorLayer::new(request_timeout))
                    .layer(TimeoutLayer::new(Duration::from_secs(
                        config.timeouts.request_secs,
                    ))),
            )
            .layer(middleware::from_fn(metrics::metrics_middleware))
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
            .layer(TraceLayer::new_for_http().make_span_with(request_span))
            .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid))
            .layer(panic_guard())
    }

    /// The fully layered router, for driving requests in-process.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until shutdown completes.
    ///
    /// Starts the limiter's idle sweep, serves until the coordinator begins
    /// draining, then lets the coordinator bound the drain and wait for
    /// background work.
    pub async fn run(self, listener: TcpListener) -> Result<(), ShutdownError> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        self.limiter
            .spawn_eviction(self.shutdown.tasks(), &self.shutdown);

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        let draining = {
            let shutdown = self.shutdown.clone();
            async move { shutdown.draining().await }
        };
        let server = axum::serve(listener, app).with_graceful_shutdown(draining);

        let result = self.shutdown.drive(server.into_future()).await;
        tracing::info!("HTTP server stopped");
        result
    }
}

/// Deadline failures from the timeout layer, rendered like any other rejection.
async fn request_timeout(err: BoxError) -> ApiError {
    if err.is::<Elapsed>() {
        ApiError::RequestTimeout
    } else {
        ApiError::Internal(err.to_string())
    }
}
