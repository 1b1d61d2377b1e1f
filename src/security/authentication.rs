//! Bearer-token authentication.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::http::error::ApiError;
use crate::observability::metrics;
use crate::security::token::{self, TokenScope};
use crate::security::{Identity, SecurityError};
use crate::storage::{Storage, StorageError};

/// Resolves `Authorization` headers to an [`Identity`].
#[derive(Clone)]
pub struct Authenticator {
    storage: Arc<dyn Storage>,
}

impl Authenticator {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Resolve the caller from the raw header value.
    ///
    /// No header means [`Identity::Anonymous`]. Anything other than
    /// `Bearer <26-char token>` naming a live authentication token is
    /// [`SecurityError::InvalidAuthenticationToken`].
    pub async fn resolve(&self, header: Option<&HeaderValue>) -> Result<Identity, SecurityError> {
        let Some(header) = header else {
            return Ok(Identity::Anonymous);
        };

        let value = header
            .to_str()
            .map_err(|_| SecurityError::InvalidAuthenticationToken)?;
        let plaintext = parse_bearer(value).ok_or(SecurityError::InvalidAuthenticationToken)?;

        token::validate(plaintext).map_err(|_| SecurityError::InvalidAuthenticationToken)?;

        let hash = token::hash(plaintext);
        match self
            .storage
            .get_user_for_token(&hash, TokenScope::Authentication)
            .await
        {
            Ok(user) => Ok(Identity::Authenticated(user)),
            Err(StorageError::NotFound) => Err(SecurityError::InvalidAuthenticationToken),
            Err(e) => Err(SecurityError::Storage(e)),
        }
    }
}

/// Split `Bearer <token>` into its token part. Exactly two space-separated parts.
fn parse_bearer(value: &str) -> Option<&str> {
    let mut parts = value.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) => Some(token),
        _ => None,
    }
}

/// Middleware attaching the resolved [`Identity`] to the request.
pub async fn authenticate(
    State(authenticator): State<Authenticator>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let resolved = authenticator
        .resolve(request.headers().get(header::AUTHORIZATION))
        .await;

    let mut response = match resolved {
        Ok(identity) => {
            if let Some(user) = identity.user() {
                tracing::debug!(user_id = user.id, "Request authenticated");
            }
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(e) => {
            metrics::record_auth_rejection(e.reason());
            ApiError::from(e).into_response()
        }
    };

    response
        .headers_mut()
        .append(header::VARY, HeaderValue::from_static("Authorization"));
    response
}
