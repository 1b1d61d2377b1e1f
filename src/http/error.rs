//! # API Error
//!
//! Maps admission, storage and handler failures to structured JSON
//! responses. Every failure crosses the HTTP boundary through this type
//! exactly once.

use std::collections::BTreeMap;

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::security::password::PasswordError;
use crate::security::token::TokenError;
use crate::security::SecurityError;
use crate::storage::StorageError;

/// Message returned for every internal error; details stay in the logs.
pub const INTERNAL_MESSAGE: &str =
    "the server encountered a problem and could not process your request";

/// Application-level error type that maps to HTTP responses.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("rate limit exceeded")]
    RateLimitExceeded,

    #[error("invalid or missing authentication token")]
    InvalidAuthenticationToken,

    #[error("you must be authenticated to access this resource")]
    AuthenticationRequired,

    #[error("your user account must be activated to access this resource")]
    InactiveAccount,

    #[error("your user account doesn't have the necessary permissions to access this resource")]
    NotPermitted,

    #[error("the requested resource could not be found")]
    NotFound,

    #[error("{0}")]
    BadRequest(String),

    #[error("the request body is too large")]
    PayloadTooLarge,

    #[error("the request took too long to process")]
    RequestTimeout,

    #[error("validation failed")]
    Validation(BTreeMap<String, String>),

    #[error("invalid authentication credentials")]
    InvalidCredentials,

    #[error("unable to update the record due to an edit conflict, please try again")]
    EditConflict,

    /// Logged in full, rendered opaquely.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            ApiError::InvalidAuthenticationToken
            | ApiError::AuthenticationRequired
            | ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::InactiveAccount | ApiError::NotPermitted => StatusCode::FORBIDDEN,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::RequestTimeout => StatusCode::REQUEST_TIMEOUT,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::EditConflict => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            ApiError::InvalidAuthenticationToken => "INVALID_AUTHENTICATION_TOKEN",
            ApiError::AuthenticationRequired => "AUTHENTICATION_REQUIRED",
            ApiError::InactiveAccount => "INACTIVE_ACCOUNT",
            ApiError::NotPermitted => "NOT_PERMITTED",
            ApiError::NotFound => "NOT_FOUND",
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            ApiError::RequestTimeout => "REQUEST_TIMEOUT",
            ApiError::Validation(_) => "VALIDATION_FAILED",
            ApiError::InvalidCredentials => "INVALID_CREDENTIALS",
            ApiError::EditConflict => "EDIT_CONFLICT",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Single-field validation failure.
    pub fn invalid(field: &str, message: &str) -> Self {
        ApiError::Validation(BTreeMap::from([(field.to_string(), message.to_string())]))
    }
}

impl From<SecurityError> for ApiError {
    fn from(err: SecurityError) -> Self {
        match err {
            SecurityError::RateLimitExceeded => ApiError::RateLimitExceeded,
            SecurityError::InvalidAuthenticationToken => ApiError::InvalidAuthenticationToken,
            SecurityError::AuthenticationRequired => ApiError::AuthenticationRequired,
            SecurityError::InactiveAccount => ApiError::InactiveAccount,
            SecurityError::NotPermitted(_) => ApiError::NotPermitted,
            SecurityError::MissingClientAddress
            | SecurityError::LockPoisoned(_)
            | SecurityError::Storage(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound => ApiError::NotFound,
            StorageError::EditConflict => ApiError::EditConflict,
            StorageError::DuplicateEmail => {
                ApiError::invalid("email", "a user with this email address already exists")
            }
            StorageError::Backend(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::Internal(detail) => {
                tracing::error!(error = %detail, "Internal error while serving request");
                serde_json::json!({
                    "error": { "code": self.code(), "message": INTERNAL_MESSAGE }
                })
            }
            ApiError::Validation(fields) => serde_json::json!({
                "error": {
                    "code": self.code(),
                    "message": self.to_string(),
                    "details": fields,
                }
            }),
            ApiError::RequestTimeout => {
                tracing::warn!("Request deadline elapsed");
                serde_json::json!({
                    "error": { "code": self.code(), "message": self.to_string() }
                })
            }
            _ => {
                tracing::debug!(code = self.code(), "Request rejected");
                serde_json::json!({
                    "error": { "code": self.code(), "message": self.to_string() }
                })
            }
        };

        let mut response = (status, axum::Json(body)).into_response();
        if matches!(self, ApiError::InvalidAuthenticationToken) {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn security_errors_map_to_stable_statuses() {
        let cases = [
            (SecurityError::RateLimitExceeded, StatusCode::TOO_MANY_REQUESTS),
            (SecurityError::InvalidAuthenticationToken, StatusCode::UNAUTHORIZED),
            (SecurityError::AuthenticationRequired, StatusCode::UNAUTHORIZED),
            (SecurityError::InactiveAccount, StatusCode::FORBIDDEN),
            (SecurityError::NotPermitted("movies:write".into()), StatusCode::FORBIDDEN),
            (SecurityError::MissingClientAddress, StatusCode::INTERNAL_SERVER_ERROR),
            (
                SecurityError::Storage(StorageError::Backend("down".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[tokio::test]
    async fn invalid_token_carries_challenge() {
        let response = ApiError::InvalidAuthenticationToken.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "INVALID_AUTHENTICATION_TOKEN");
    }

    #[tokio::test]
    async fn internal_details_are_not_leaked() {
        let response = ApiError::Internal("connection refused to 10.0.0.3".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.headers().get(header::WWW_AUTHENTICATE).is_none());
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "INTERNAL_ERROR");
        assert_eq!(body["error"]["message"], INTERNAL_MESSAGE);
    }

    #[tokio::test]
    async fn duplicate_email_is_a_field_error() {
        let response = ApiError::from(StorageError::DuplicateEmail).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(response).await;
        assert_eq!(
            body["error"]["details"]["email"],
            "a user with this email address already exists"
        );
    }
}
