use axum::{
    extract::{Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{
    AppState,
    auth::{AuthUser, OptionalAuthUser},
    error::{AppError, Result},
    models::{CategoryFilter, CreateMediaRequest, MediaListResponse, VoteOutcome, VoteRequest},
    services::media_service,
};

#[derive(Debug, Deserialize)]
pub struct GetMediaQuery {
    pub category: Option<String>,
}

pub async fn get_media(
    State(state): State<AppState>,
    auth_user: OptionalAuthUser,
    Query(params): Query<GetMediaQuery>,
) -> Result<Json<MediaListResponse>> {
    let filter = params
        .category
        .as_deref()
        .map(str::parse::<CategoryFilter>)
        .transpose()
        .map_err(AppError::InvalidArgument)?
        .unwrap_or_default();

    let media = media_service::list_media(state.repo.as_ref(), auth_user.user_id(), filter).await?;

    Ok(Json(MediaListResponse { media }))
}

pub async fn create_media(
    State(state): State<AppState>,
    auth_user: AuthUser,
    payload: std::result::Result<Json<CreateMediaRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>)> {
    let Json(payload) = payload.map_err(|e| AppError::InvalidArgument(e.body_text()))?;

    let media =
        media_service::create_media(state.repo.as_ref(), auth_user.user_id, &payload).await?;

    Ok((StatusCode::CREATED, Json(json!({ "media": media }))))
}

pub async fn vote_media(
    State(state): State<AppState>,
    auth_user: AuthUser,
    payload: std::result::Result<Json<VoteRequest>, JsonRejection>,
) -> Result<Json<VoteOutcome>> {
    let Json(payload) = payload.map_err(|e| AppError::InvalidArgument(e.body_text()))?;

    // Rate limiting for voting
    if let Some(redis) = &state.redis {
        let rate_limit_key = format!("vote_media:{}", auth_user.user_id);
        if !redis
            .check_rate_limit(&rate_limit_key, state.config.vote_rate_limit, 3600)
            .await?
        {
            return Err(AppError::RateLimit);
        }
    }

    let outcome = state
        .votes
        .cast_vote(Some(auth_user.user_id), payload.media_id, &payload.direction)
        .await?;

    Ok(Json(outcome))
}

pub async fn get_my_votes(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Result<Json<Value>> {
    let votes = media_service::votes_of(state.repo.as_ref(), auth_user.user_id).await?;

    Ok(Json(json!({ "votes": votes })))
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
