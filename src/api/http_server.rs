// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    extract::{DefaultBodyLimit, State},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::detect::{detect_handler, HealthResponse};
use crate::config::ServerConfig;
use crate::vision::CascadeController;

pub const BANNER: &str = "Kidney Stone Detection API is running!";

/// Shared handler state; the cascade owns the immutable model pool
#[derive(Clone)]
pub struct AppState {
    pub cascade: Arc<CascadeController>,
}

impl AppState {
    pub fn new(cascade: Arc<CascadeController>) -> Self {
        Self { cascade }
    }
}

/// Build the router with all routes and layers
pub fn create_router(state: AppState, config: &ServerConfig) -> Router {
    Router::new()
        // Banner
        .route("/", get(index_handler))
        // Health check
        .route("/health", get(health_handler))
        // Detection endpoint
        .route("/detect", post(detect_handler))
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn start_server(
    cascade: Arc<CascadeController>,
    config: ServerConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let app = create_router(AppState::new(cascade), &config);

    let addr = config.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("API server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

async fn index_handler() -> &'static str {
    BANNER
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: crate::version::VERSION_NUMBER.to_string(),
        models: state.cascade.pool().list_models(),
    })
}
