//! HTTP transport over the memory engine
//!
//! A thin axum layer: parse, check limits, call the engine, map errors.
//! Every route except `/health` sits behind the optional API-key check.

pub mod auth;
pub mod error;
pub mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::middleware;
use axum::routing::{delete, get, post};
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::error::{Result, StateLockError};
use crate::memory::MemoryEngine;
use crate::validation::Limits;

pub use error::ApiError;

/// Shared application state for all handlers
pub struct AppState {
    pub engine: MemoryEngine,
    pub limits: Limits,
    pub server: ServerConfig,
}

/// Create the router with all routes configured
pub fn create_router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route(
            "/memories",
            get(handlers::list_memories).post(handlers::add_memory),
        )
        .route(
            "/memories/",
            get(handlers::list_memories).post(handlers::add_memory),
        )
        .route("/memories/upsert", post(handlers::upsert_memory))
        .route("/memories/query", post(handlers::query_memories))
        .route(
            "/memories/query/hybrid",
            post(handlers::hybrid_query_memories),
        )
        .route("/memories/bulk", delete(handlers::delete_bulk))
        .route(
            "/memories/session/{session_id}",
            delete(handlers::delete_session),
        )
        .route(
            "/memories/session/{session_id}/snapshot",
            get(handlers::snapshot_session),
        )
        .route(
            "/memories/session/{session_id}/restore",
            post(handlers::restore_session),
        )
        .route(
            "/memories/{id}",
            get(handlers::get_memory).delete(handlers::delete_memory),
        )
        .route("/sessions", get(handlers::list_sessions))
        .route("/tags", get(handlers::list_tags))
        .route("/stats/overview", get(handlers::stats_overview))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_api_key,
        ));

    Router::new()
        .route("/health", get(handlers::health_handler))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// The HTTP daemon
pub struct ApiServer {
    state: Arc<AppState>,
}

impl ApiServer {
    pub fn new(engine: MemoryEngine, limits: Limits, server: ServerConfig) -> Self {
        Self {
            state: Arc::new(AppState {
                engine,
                limits,
                server,
            }),
        }
    }

    pub fn router(&self) -> Router {
        create_router(self.state.clone())
    }

    /// Bind and serve until Ctrl+C or SIGTERM
    pub async fn serve(&self) -> Result<()> {
        let addr: SocketAddr = self
            .state
            .server
            .listen_addr
            .parse()
            .map_err(|e| StateLockError::Config(format!("Invalid listen address: {e}")))?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| StateLockError::Internal(format!("Failed to bind to {addr}: {e}")))?;

        tracing::info!("StateLock listening on {addr}");
        if self.state.server.auth_required {
            tracing::info!("API key required on header X-Statelock-Api-Key");
        }

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| StateLockError::Internal(format!("Server error: {e}")))?;

        tracing::info!("Server shut down gracefully");
        Ok(())
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {e}");
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
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        },
    }
}
