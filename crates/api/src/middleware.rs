//! API middleware.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderValue, Method, Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use ballotbox_common::IdGenerator;
use ballotbox_core::{ActorSystem, CredentialVerifier, IdentityService, PollService};

/// Methods advertised to browsers.
pub const ALLOWED_METHODS: &str = "GET,POST,PUT,PATCH,DELETE,OPTIONS";
/// Request headers advertised to browsers.
pub const ALLOWED_HEADERS: &str = "Content-Type, Authorization";

/// Application state.
#[derive(Clone)]
pub struct AppState {
    /// Poll actor client.
    pub poll_service: PollService,
    /// Identity actor client.
    pub identity_service: IdentityService,
    /// Bearer token verifier.
    pub verifier: Arc<dyn CredentialVerifier>,
    /// Id source for server-assigned poll ids.
    pub id_gen: IdGenerator,
}

impl AppState {
    /// Build state over a running actor system.
    #[must_use]
    pub fn new(system: &ActorSystem, verifier: Arc<dyn CredentialVerifier>) -> Self {
        Self {
            poll_service: system.polls.clone(),
            identity_service: system.identities.clone(),
            verifier,
            id_gen: IdGenerator::new(),
        }
    }
}

/// Authentication middleware.
///
/// A verified bearer token puts an `AuthClaim` in the request extensions.
/// Anything else leaves the request anonymous.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    if let Some(auth_header) = req.headers().get(header::AUTHORIZATION)
        && let Ok(auth_str) = auth_header.to_str()
        && let Some(token) = auth_str.strip_prefix("Bearer ")
        && let Some(claim) = state.verifier.verify(token.trim())
    {
        req.extensions_mut().insert(claim);
    }

    next.run(req).await
}

/// Answers preflight requests and marks every response cross-origin readable.
pub async fn cors_middleware(req: Request<Body>, next: Next) -> Response {
    let mut response = if req.method() == Method::OPTIONS {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(req).await
    };

    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOWED_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOWED_HEADERS),
    );
    response
}
