//! Registration and activation.

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::validate::{self, JsonBody, Validator};
use crate::http::error::ApiError;
use crate::http::server::AppState;
use crate::notify::WELCOME_TEMPLATE;
use crate::security::password;
use crate::security::token::{self, Token, TokenScope};
use crate::storage::{NewUser, StorageError};

/// Granted to every new account.
pub const DEFAULT_PERMISSION: &str = "movies:read";

#[derive(Debug, Deserialize)]
pub struct RegisterInput {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ActivateInput {
    pub token: String,
}

fn validate_registration(input: &RegisterInput) -> Result<(), ApiError> {
    let mut v = Validator::new();
    v.check(!input.name.is_empty(), "name", "must be provided");
    v.check(input.name.len() <= 500, "name", "must not be more than 500 bytes long");
    validate::validate_email(&mut v, &input.email);
    validate::validate_password(&mut v, &input.password);
    v.finish()
}

async fn grant_and_issue(state: &AppState, user_id: i64) -> Result<Token, ApiError> {
    state
        .storage
        .add_permissions(user_id, &[DEFAULT_PERMISSION])
        .await?;

    let activation = Token::generate(user_id, state.tokens.activation_ttl(), TokenScope::Activation)?;
    state.storage.insert_token(&activation).await?;
    Ok(activation)
}

/// POST /v1/users
///
/// Creates an inactive account and queues the welcome mail carrying the
/// activation token. The mail is sent after the response, as tracked
/// background work.
pub async fn register(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<RegisterInput>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    validate_registration(&input)?;

    let password_hash = password::hash(input.password).await?;
    let user = state
        .storage
        .insert_user(NewUser {
            name: input.name,
            email: input.email,
            password_hash,
            activated: false,
        })
        .await?;

    let activation = match grant_and_issue(&state, user.id).await {
        Ok(token) => token,
        Err(e) => {
            // No user survives without an activation token.
            if let Err(cleanup) = state.storage.delete_user(user.id).await {
                tracing::error!(user_id = user.id, error = %cleanup, "Failed to remove partial registration");
            }
            return Err(e);
        }
    };

    let notifier = state.notifier.clone();
    let recipient = user.email.clone();
    let data = json!({
        "activationToken": activation.plaintext,
        "userID": user.id,
    });
    state.tasks.spawn("welcome_email", async move {
        if let Err(e) = notifier.send(&recipient, WELCOME_TEMPLATE, data).await {
            tracing::error!(recipient = %recipient, error = %e, "Failed to send welcome email");
        }
    });

    tracing::info!(user_id = user.id, "User registered");
    Ok((StatusCode::ACCEPTED, Json(json!({ "user": user }))))
}

/// PUT /v1/users/activated
pub async fn activate(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<ActivateInput>,
) -> Result<Json<Value>, ApiError> {
    let mut v = Validator::new();
    validate::validate_token(&mut v, &input.token);
    v.finish()?;

    let mut user = match state
        .storage
        .get_user_for_token(&token::hash(&input.token), TokenScope::Activation)
        .await
    {
        Ok(user) => user,
        Err(StorageError::NotFound) => {
            return Err(ApiError::invalid("token", "invalid or expired activation token"))
        }
        Err(e) => return Err(e.into()),
    };

    user.activated = true;
    let user = state.storage.update_user(&user).await?;

    state
        .storage
        .delete_tokens(TokenScope::Activation, user.id)
        .await?;

    tracing::info!(user_id = user.id, "User activated");
    Ok(Json(json!({ "user": user })))
}
