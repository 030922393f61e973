//! Identity endpoints.
//!
//! Every route acts on the caller's own identity, so one identity can never
//! read or mutate another's record.

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::{get, post},
};
use ballotbox_common::{AppError, AppResult};
use ballotbox_core::VoteStatus;
use ballotbox_db::IdentityRecord;
use serde::Deserialize;
use validator::Validate;

use super::Ack;
use crate::{
    extractors::{ApiJson, AuthUser},
    middleware::AppState,
};

/// Add-poll request.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddPollRequest {
    #[validate(length(min = 1))]
    pub poll_id: String,
}

/// Add-vote request.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddVoteRequest {
    #[validate(length(min = 1))]
    pub poll_id: String,
    pub option_index: u32,
}

/// Has-voted query.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HasVotedQuery {
    pub poll_id: Option<String>,
}

async fn get_state(
    AuthUser(claim): AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<IdentityRecord>> {
    let identity = state.identity_service.get_state(&claim.subject).await?;
    Ok(Json(identity))
}

async fn add_poll(
    AuthUser(claim): AuthUser,
    State(state): State<AppState>,
    ApiJson(req): ApiJson<AddPollRequest>,
) -> AppResult<Json<Ack>> {
    req.validate()?;
    state
        .identity_service
        .add_poll(&claim.subject, &req.poll_id)
        .await?;
    Ok(Json(Ack::ok()))
}

async fn add_vote(
    AuthUser(claim): AuthUser,
    State(state): State<AppState>,
    ApiJson(req): ApiJson<AddVoteRequest>,
) -> AppResult<Json<Ack>> {
    req.validate()?;
    state
        .identity_service
        .add_vote(&claim.subject, &req.poll_id, req.option_index)
        .await?;
    Ok(Json(Ack::ok()))
}

async fn has_voted(
    AuthUser(claim): AuthUser,
    State(state): State<AppState>,
    Query(query): Query<HasVotedQuery>,
) -> AppResult<Json<VoteStatus>> {
    let poll_id = query
        .poll_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing pollId".to_string()))?;

    let status = state
        .identity_service
        .has_voted(&claim.subject, &poll_id)
        .await?;
    Ok(Json(status))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/state", get(get_state))
        .route("/add-poll", post(add_poll))
        .route("/add-vote", post(add_vote))
        .route("/has-voted", get(has_voted))
}
