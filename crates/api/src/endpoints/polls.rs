//! Poll endpoints.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
};
use ballotbox_common::AppResult;
use ballotbox_core::{CreatePollInput, UpdatePollInput, VoteOutcome};
use ballotbox_db::PollRecord;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::Ack;
use crate::{
    extractors::{ApiJson, AuthUser},
    middleware::AppState,
};

/// Vote request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    pub option_index: i64,
}

/// Poll body for server-assigned ids.
#[derive(Debug, Deserialize)]
pub struct NewPollRequest {
    pub question: String,
    pub options: Vec<String>,
    pub ttl: u64,
}

/// Response to a server-assigned create.
#[derive(Debug, Serialize)]
pub struct CreatedPoll {
    pub id: String,
}

/// Read a poll.
async fn get_state(
    State(state): State<AppState>,
    Path(poll_id): Path<String>,
) -> AppResult<Json<PollRecord>> {
    let poll = state.poll_service.get_state(&poll_id).await?;
    Ok(Json(poll))
}

/// Create a poll under a caller-chosen id.
async fn create(
    AuthUser(claim): AuthUser,
    State(state): State<AppState>,
    Path(poll_id): Path<String>,
    ApiJson(input): ApiJson<CreatePollInput>,
) -> AppResult<(StatusCode, Json<Ack>)> {
    state
        .poll_service
        .create(&poll_id, Some(claim), input)
        .await?;
    Ok((StatusCode::CREATED, Json(Ack::ok())))
}

/// Create a poll under a fresh id, owned by the caller.
async fn create_with_generated_id(
    AuthUser(claim): AuthUser,
    State(state): State<AppState>,
    ApiJson(req): ApiJson<NewPollRequest>,
) -> AppResult<(StatusCode, Json<CreatedPoll>)> {
    let id = state.id_gen.generate();
    let input = CreatePollInput {
        id: id.clone(),
        question: req.question,
        options: req.options,
        ttl: req.ttl,
        created_at: chrono::Utc::now().timestamp_millis(),
        owner_id: claim.subject.clone(),
        votes: None,
    };

    state.poll_service.create(&id, Some(claim), input).await?;
    debug!(poll_id = %id, "Assigned poll id");
    Ok((StatusCode::CREATED, Json(CreatedPoll { id })))
}

/// Owner-only partial update.
async fn update(
    AuthUser(claim): AuthUser,
    State(state): State<AppState>,
    Path(poll_id): Path<String>,
    ApiJson(patch): ApiJson<UpdatePollInput>,
) -> AppResult<Json<PollRecord>> {
    let poll = state
        .poll_service
        .update(&poll_id, Some(claim), patch)
        .await?;
    Ok(Json(poll))
}

/// Owner-only delete.
async fn delete_poll(
    AuthUser(claim): AuthUser,
    State(state): State<AppState>,
    Path(poll_id): Path<String>,
) -> AppResult<Json<Ack>> {
    state.poll_service.delete(&poll_id, Some(claim)).await?;
    Ok(Json(Ack::ok()))
}

/// Cast a vote.
async fn vote(
    AuthUser(claim): AuthUser,
    State(state): State<AppState>,
    Path(poll_id): Path<String>,
    ApiJson(req): ApiJson<VoteRequest>,
) -> AppResult<Json<VoteOutcome>> {
    let outcome = state
        .poll_service
        .vote(&poll_id, Some(claim), req.option_index)
        .await?;
    Ok(Json(outcome))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_with_generated_id))
        .route("/{id}/state", get(get_state).put(create).patch(update))
        .route("/{id}/delete", delete(delete_poll))
        .route("/{id}/vote", post(vote))
}
