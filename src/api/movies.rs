//! Movie catalogue. Straight pass-through to storage.

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    Json,
};
use chrono::{Datelike, Utc};
use serde_json::{json, Value};

use crate::api::validate::{JsonBody, RecordId, Validator};
use crate::http::error::ApiError;
use crate::http::server::AppState;
use crate::storage::NewMovie;

fn validate_movie(movie: &NewMovie) -> Result<(), ApiError> {
    let mut v = Validator::new();
    v.check(!movie.title.is_empty(), "title", "must be provided");
    v.check(movie.title.len() <= 500, "title", "must not be more than 500 bytes long");

    v.check(movie.year != 0, "year", "must be provided");
    v.check(movie.year >= 1888, "year", "must be greater than 1888");
    v.check(movie.year <= Utc::now().year(), "year", "must not be in the future");

    v.check(movie.runtime != 0, "runtime", "must be provided");
    v.check(movie.runtime > 0, "runtime", "must be a positive integer");

    v.check(!movie.genres.is_empty(), "genres", "must contain at least 1 genre");
    v.check(movie.genres.len() <= 5, "genres", "must not contain more than 5 genres");
    let mut seen = std::collections::HashSet::new();
    v.check(
        movie.genres.iter().all(|g| seen.insert(g.as_str())),
        "genres",
        "must not contain duplicate values",
    );
    v.finish()
}

/// GET /v1/movies
pub async fn list(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let movies = state.storage.list_movies().await?;
    Ok(Json(json!({ "movies": movies })))
}

/// GET /v1/movies/{id}
pub async fn show(
    State(state): State<AppState>,
    RecordId(id): RecordId,
) -> Result<Json<Value>, ApiError> {
    let movie = state.storage.get_movie(id).await?;
    Ok(Json(json!({ "movie": movie })))
}

/// POST /v1/movies
pub async fn create(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<NewMovie>,
) -> Result<(StatusCode, HeaderMap, Json<Value>), ApiError> {
    validate_movie(&input)?;

    let movie = state.storage.insert_movie(input).await?;

    let mut headers = HeaderMap::new();
    if let Ok(location) = HeaderValue::from_str(&format!("/v1/movies/{}", movie.id)) {
        headers.insert(header::LOCATION, location);
    }
    Ok((StatusCode::CREATED, headers, Json(json!({ "movie": movie }))))
}

/// DELETE /v1/movies/{id}
pub async fn remove(
    State(state): State<AppState>,
    RecordId(id): RecordId,
) -> Result<Json<Value>, ApiError> {
    state.storage.delete_movie(id).await?;
    Ok(Json(json!({ "message": "movie successfully deleted" })))
}
