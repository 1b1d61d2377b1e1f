//! JSON API surface.
//!
//! # Routes
//! ```text
//! GET    /v1/healthcheck              public
//! POST   /v1/users                    public
//! PUT    /v1/users/activated          public
//! POST   /v1/tokens/authentication    public
//! GET    /v1/movies                   movies:read
//! POST   /v1/movies                   movies:write
//! GET    /v1/movies/{id}              movies:read
//! DELETE /v1/movies/{id}              movies:write
//! ```
//!
//! Permission gates are attached per method with `route_layer`, so a
//! request that fails a gate never reaches the handler.

pub mod healthcheck;
pub mod movies;
pub mod tokens;
pub mod users;
pub mod validate;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use crate::http::error::ApiError;
use crate::http::server::AppState;
use crate::security::authorization::{authorize, Authorization};
use crate::security::Policy;

pub const MOVIES_READ: &str = "movies:read";
pub const MOVIES_WRITE: &str = "movies:write";

/// Build the API router with per-route authorization.
pub fn routes(state: AppState) -> Router {
    let read = middleware::from_fn_with_state(
        Authorization::new(Policy::permission(MOVIES_READ), state.storage.clone()),
        authorize,
    );
    let write = middleware::from_fn_with_state(
        Authorization::new(Policy::permission(MOVIES_WRITE), state.storage.clone()),
        authorize,
    );

    Router::new()
        .route("/v1/healthcheck", get(healthcheck::show))
        .route("/v1/users", post(users::register))
        .route("/v1/users/activated", put(users::activate))
        .route("/v1/tokens/authentication", post(tokens::create_authentication))
        .route(
            "/v1/movies",
            get(movies::list)
                .route_layer(read.clone())
                .merge(post(movies::create).route_layer(write.clone())),
        )
        .route(
            "/v1/movies/{id}",
            get(movies::show)
                .route_layer(read)
                .merge(delete(movies::remove).route_layer(write)),
        )
        .fallback(not_found)
        .with_state(state)
}

async fn not_found() -> ApiError {
    ApiError::NotFound
}
