//! API endpoints.

mod identity;
mod polls;

use axum::Router;
use ballotbox_common::AppError;
use serde::Serialize;

use crate::middleware::AppState;

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/polls", polls::router())
        .nest("/identity", identity::router())
        .fallback(not_found)
}

/// Acknowledgement body for operations without a payload.
#[derive(Debug, Serialize)]
pub struct Ack {
    /// Always `true`.
    pub ok: bool,
}

impl Ack {
    const fn ok() -> Self {
        Self { ok: true }
    }
}

async fn not_found() -> AppError {
    AppError::NotFound("No such route".to_string())
}
