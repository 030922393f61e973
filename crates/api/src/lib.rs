//! HTTP surface for ballotbox.
//!
//! - **Endpoints**: poll and identity sub-request protocols
//! - **Extractors**: bearer claims and JSON bodies with 400 rejections
//! - **Middleware**: bearer authentication and permissive CORS
//!
//! Built on Axum 0.8.

pub mod endpoints;
pub mod extractors;
pub mod middleware;

use axum::Router;

pub use endpoints::router;
pub use middleware::AppState;

/// The API router with authentication and CORS applied, ready to serve.
pub fn app(state: AppState) -> Router {
    router()
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ))
        .layer(axum::middleware::from_fn(middleware::cors_middleware))
        .with_state(state)
}
