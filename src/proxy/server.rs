//! HTTP server setup and configuration.

use axum::{
    extract::Request,
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{any, post},
    Router,
};
use std::sync::Arc;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use super::auth;
use super::handlers;
use super::stream::{pacer_for, Pacer};
use super::upstream::UpstreamClient;
use crate::config::Config;
use crate::error::Result;

/// Shared application state. Read-only after startup.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub upstream: Arc<UpstreamClient>,
    pub pacer: Arc<dyn Pacer>,
}

impl AppState {
    /// Build state from configuration, pacing streams per `streaming.delay_ms`.
    pub fn new(config: Config) -> Result<Self> {
        let upstream = UpstreamClient::new(config.upstream.clone())?;
        let pacer = pacer_for(config.streaming.delay());
        Ok(Self {
            config: Arc::new(config),
            upstream: Arc::new(upstream),
            pacer,
        })
    }

    /// Replace the pacing policy.
    pub fn with_pacer(mut self, pacer: Arc<dyn Pacer>) -> Self {
        self.pacer = pacer;
        self
    }
}

/// Answer every `OPTIONS` request with an empty 204 before any other logic.
async fn preflight(request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        return StatusCode::NO_CONTENT.into_response();
    }
    next.run(request).await
}

/// Create the axum router with all endpoints.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // OpenAI-compatible endpoints
        .route("/v1/models", any(handlers::list_models))
        .route(
            "/v1/chat/completions",
            post(handlers::chat_completions).fallback(handlers::not_found),
        )
        .fallback(handlers::not_found)
        // Innermost first: auth, then preflight, tracing, and CORS headers
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_master_key,
        ))
        .layer(middleware::from_fn(preflight))
        .layer(TraceLayer::new_for_http())
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("GET, POST, OPTIONS"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("Content-Type, Authorization"),
        ))
        .with_state(state)
}

/// Run the HTTP server.
pub async fn run_server(config: Config) -> anyhow::Result<()> {
    let listen_addr = config.server.listen;
    let state = AppState::new(config)?;

    tracing::info!(
        upstream = %state.upstream.url(),
        models = state.config.models.len(),
        auth_open = state.config.auth.is_open(),
        "Relay configured"
    );

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    tracing::info!(address = %listen_addr, "Starting nanobanana-relay server");

    axum::serve(listener, app).await?;

    Ok(())
}
