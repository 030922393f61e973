//! Ballotbox server entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use ballotbox_api::{AppState, app};
use ballotbox_common::Config;
use ballotbox_core::{ActorSystem, JwtVerifier};
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ballotbox=debug,tower_http=debug".into()),
        )
        .init();

    info!("Starting ballotbox server...");

    let config = Config::load().context("failed to load configuration")?;

    let store = ballotbox_db::init(&config.storage).await?;
    info!(backend = ?config.storage.backend, "State store ready");

    // Identities before polls: poll actors deliver into identity actors.
    let system = ActorSystem::new(store, &config);
    let verifier = Arc::new(JwtVerifier::from_config(&config.auth));
    let state = AppState::new(&system, verifier);

    let app = app(state).layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("invalid server.host / server.port")?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    for entry in system.outbox.drain_dead_letters() {
        warn!(
            kind = entry.payload.kind(),
            subject = %entry.payload.subject(),
            poll_id = %entry.payload.poll_id(),
            attempts = entry.attempts,
            failed_at = %entry.failed_at,
            error = %entry.last_error,
            "Undelivered identity notification at shutdown"
        );
    }
    info!("Server shutdown complete");
    Ok(())
}
