//! Token issuance.

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::validate::{self, JsonBody, Validator};
use crate::http::error::ApiError;
use crate::http::server::AppState;
use crate::security::password;
use crate::security::token::{Token, TokenScope};
use crate::storage::StorageError;

#[derive(Debug, Deserialize)]
pub struct CredentialsInput {
    pub email: String,
    pub password: String,
}

/// POST /v1/tokens/authentication
///
/// Earlier authentication tokens of the user are revoked before the new
/// one is issued.
pub async fn create_authentication(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<CredentialsInput>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let mut v = Validator::new();
    validate::validate_email(&mut v, &input.email);
    validate::validate_password(&mut v, &input.password);
    v.finish()?;

    let user = match state.storage.get_user_by_email(&input.email).await {
        Ok(user) => user,
        Err(StorageError::NotFound) => return Err(ApiError::InvalidCredentials),
        Err(e) => return Err(e.into()),
    };

    if !password::matches(input.password, user.password_hash.clone()).await? {
        tracing::debug!(user_id = user.id, "Password mismatch");
        return Err(ApiError::InvalidCredentials);
    }

    state
        .storage
        .delete_tokens(TokenScope::Authentication, user.id)
        .await?;

    let token = Token::generate(
        user.id,
        state.tokens.authentication_ttl(),
        TokenScope::Authentication,
    )?;
    state.storage.insert_token(&token).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "authentication_token": token })),
    ))
}
