//! Input validation helpers shared by the handlers.

use std::collections::BTreeMap;

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{FromRequest, FromRequestParts, Path, Request};
use axum::http::request::Parts;
use serde::de::DeserializeOwned;

use crate::http::error::ApiError;
use crate::security::token;

/// Collects field errors; the first message recorded for a field wins.
#[derive(Debug, Default)]
pub struct Validator {
    errors: BTreeMap<String, String>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&mut self, ok: bool, field: &str, message: &str) {
        if !ok {
            self.errors
                .entry(field.to_string())
                .or_insert_with(|| message.to_string());
        }
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn finish(self) -> Result<(), ApiError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(self.errors))
        }
    }
}

/// `local@domain.tld` with no whitespace.
pub fn is_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !value.chars().any(char::is_whitespace)
        && !domain.contains('@')
}

pub fn validate_email(v: &mut Validator, email: &str) {
    v.check(!email.is_empty(), "email", "must be provided");
    v.check(is_email(email), "email", "must be a valid email address");
}

pub fn validate_password(v: &mut Validator, password: &str) {
    v.check(!password.is_empty(), "password", "must be provided");
    v.check(password.len() >= 8, "password", "must be at least 8 bytes long");
    v.check(password.len() <= 72, "password", "must not be more than 72 bytes long");
}

pub fn validate_token(v: &mut Validator, plaintext: &str) {
    if let Err(e) = token::validate(plaintext) {
        v.check(false, "token", &e.to_string());
    }
}

/// JSON body extractor that reports failures as [`ApiError`].
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match axum::Json::<T>::from_request(req, state).await {
            Ok(axum::Json(value)) => Ok(JsonBody(value)),
            Err(rejection) => Err(json_rejection(rejection)),
        }
    }
}

fn json_rejection(rejection: JsonRejection) -> ApiError {
    if rejection.status() == axum::http::StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge
    } else {
        ApiError::BadRequest(rejection.body_text())
    }
}

/// Positive integer `{id}` path segment; anything else is a 404.
pub struct RecordId(pub i64);

impl<S> FromRequestParts<S> for RecordId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let id = Path::<i64>::from_request_parts(parts, state)
            .await
            .map_err(|_: PathRejection| ApiError::NotFound)?;
        if id.0 < 1 {
            return Err(ApiError::NotFound);
        }
        Ok(RecordId(id.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_message_per_field_wins() {
        let mut v = Validator::new();
        validate_password(&mut v, "");
        assert!(!v.is_valid());
        match v.finish().unwrap_err() {
            ApiError::Validation(fields) => assert_eq!(fields["password"], "must be provided"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn email_shapes() {
        assert!(is_email("alice@example.com"));
        assert!(!is_email("alice"));
        assert!(!is_email("alice@localhost"));
        assert!(!is_email("@example.com"));
        assert!(!is_email("al ice@example.com"));
        assert!(!is_email("a@b@example.com"));
    }

    #[test]
    fn password_bounds_count_bytes() {
        let mut v = Validator::new();
        validate_password(&mut v, &"x".repeat(72));
        assert!(v.is_valid());

        let mut v = Validator::new();
        validate_password(&mut v, &"x".repeat(73));
        assert!(!v.is_valid());
    }

    #[test]
    fn token_shape_is_checked() {
        let mut v = Validator::new();
        validate_token(&mut v, "short");
        match v.finish().unwrap_err() {
            ApiError::Validation(fields) => assert_eq!(fields["token"], "must be 26 bytes long"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
