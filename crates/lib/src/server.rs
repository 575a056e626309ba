//! Webhook HTTP server: POST /callback for LINE events, GET / for health probes.

use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::line::{self, LineClient, WebhookError};
use crate::search::HotPepperClient;
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;

/// Shared state for request handlers. Read-only after startup.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub dispatcher: Arc<Dispatcher>,
}

impl AppState {
    /// State wired to the real LINE and HotPepper clients.
    pub fn from_config(config: Config) -> Self {
        let replies = Arc::new(LineClient::new(
            &config.line.api_base,
            config.line.channel_token.clone().unwrap_or_default(),
        ));
        let search = Arc::new(HotPepperClient::new(&config.search));
        let dispatcher = Dispatcher::new(replies, search, config.search.timeout());
        Self {
            config: Arc::new(config),
            dispatcher: Arc::new(dispatcher),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health_http))
        .route("/callback", post(callback))
        .with_state(state)
}

/// Run the server; binds to config.server.bind:config.server.port.
/// Fails before binding when a required credential is missing. Blocks until shutdown (e.g. Ctrl+C).
pub async fn run_server(config: Config) -> Result<()> {
    config.validate()?;
    let bind_addr = format!("{}:{}", config.server.bind.trim(), config.server.port);
    let app = router(AppState::from_config(config));

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server exited")?;
    log::info!("server stopped");
    Ok(())
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received, draining connections");
}

/// POST /callback — verifies x-line-signature, then answers every event before returning 200.
async fn callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let secret = state.config.line.channel_secret.as_deref().unwrap_or("");
    let signature = headers
        .get(line::SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());
    let events = match line::parse_request(secret, signature, &body) {
        Ok(events) => events,
        Err(WebhookError::InvalidSignature) => {
            log::warn!("callback rejected: invalid signature");
            return StatusCode::BAD_REQUEST;
        }
        Err(e) => {
            log::error!("callback: {}", e);
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
    };
    let report = state.dispatcher.handle(events).await;
    log::debug!(
        "callback handled: sent={} failed={} ignored={} search_failures={}",
        report.sent,
        report.failed,
        report.ignored,
        report.search_failures
    );
    StatusCode::OK
}

/// GET / returns a simple health JSON (for probes).
async fn health_http(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "runtime": "running",
        "port": state.config.server.port,
    }))
}
