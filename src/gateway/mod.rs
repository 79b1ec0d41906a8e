//! Axum-based HTTP gateway for the Messenger webhook.
//!
//! - `GET /webhook`: subscription verification handshake
//! - `POST /webhook`: event intake, acknowledged before any processing
//! - `GET /health`: liveness
//! - everything else: static files from the public directory, when present
//!
//! Every route shares a 64KB body limit and a 30s request timeout.

use crate::channels::{Channel, MessengerChannel, WebhookPayload};
use crate::config::Config;
use crate::delivery::DeliveryQueue;
use crate::dispatch::Dispatcher;
use crate::providers::HttpContentProvider;
use crate::session::LruSessionStore;
use crate::util::constant_time_eq;
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::ServeDir;
use tower_http::timeout::TimeoutLayer;

/// Maximum request body size (64KB).
pub const MAX_BODY_SIZE: usize = 65_536;
/// Request timeout (30s).
pub const REQUEST_TIMEOUT_SECS: u64 = 30;
/// How long shutdown waits for queued replies before dropping them.
pub const SHUTDOWN_DRAIN_SECS: u64 = 10;

const EVENT_RECEIVED: &str = "EVENT_RECEIVED";
const VERIFICATION_FAILED: &str = "Verification failed.";
const NOT_FOUND: &str = "Not Found";

/// Shared state for all axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub channel: Arc<dyn Channel>,
    pub verify_token: Arc<str>,
}

/// Query of the platform's subscription handshake.
#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

/// Wire the relay together from `config` and serve until ctrl-c / SIGTERM.
pub async fn run_gateway(config: Config) -> Result<()> {
    config.validate()?;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.http.timeout_secs.max(1)))
        .build()
        .context("Failed to build outbound HTTP client")?;

    let channel: Arc<dyn Channel> = Arc::new(MessengerChannel::new(
        client.clone(),
        &config.messenger.graph_api_url,
        config.messenger.page_access_token.clone(),
    ));
    let (replies, delivery_worker) = DeliveryQueue::spawn(
        Arc::clone(&channel),
        config.delivery.chunk_interval(),
        config.delivery.max_message_chars,
    );
    let sessions = Arc::new(LruSessionStore::new(
        config.session.capacity,
        config.session.ttl(),
    ));
    let provider = Arc::new(HttpContentProvider::new(client, config.providers.clone()));
    let dispatcher = Arc::new(Dispatcher::new(
        provider,
        sessions,
        Arc::clone(&channel),
        replies,
    ));

    let state = AppState {
        dispatcher,
        channel,
        verify_token: Arc::from(config.messenger.verify_token.as_str()),
    };
    let public_dir = config.gateway.public_dir.as_path();
    let app = build_router(state, Some(public_dir).filter(|dir| dir.is_dir()));

    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind gateway on {addr}"))?;
    let actual = listener.local_addr().context("Failed to read bound address")?;
    tracing::info!("Webhook gateway listening on http://{actual}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Gateway server failed")?;

    tracing::info!("Gateway stopped; draining queued replies");
    delivery_worker
        .drain(Duration::from_secs(SHUTDOWN_DRAIN_SECS))
        .await;
    Ok(())
}

/// Routes plus the shared body limit and timeout. Static files are served as
/// the fallback when `public_dir` is given.
pub fn build_router(state: AppState, public_dir: Option<&Path>) -> Router {
    let mut router = Router::new()
        .route("/webhook", get(handle_verify).post(handle_webhook))
        .route("/health", get(handle_health))
        .with_state(state);

    if let Some(dir) = public_dir {
        router = router.fallback_service(ServeDir::new(dir));
    }

    router
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(REQUEST_TIMEOUT_SECS),
        ))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("ctrl-c handler failed: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                tracing::error!("SIGTERM handler unavailable: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received ctrl-c"),
        () = terminate => tracing::info!("received SIGTERM"),
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// AXUM HANDLERS
// ══════════════════════════════════════════════════════════════════════════════

/// GET /health
async fn handle_health(State(state): State<AppState>) -> impl IntoResponse {
    let healthy = state.channel.health_check().await;
    Json(serde_json::json!({
        "status": "ok",
        "channel": {
            "name": state.channel.name(),
            "healthy": healthy,
        },
    }))
}

/// GET /webhook: subscription verification
async fn handle_verify(
    State(state): State<AppState>,
    Query(params): Query<VerifyQuery>,
) -> impl IntoResponse {
    let token_matches = params
        .verify_token
        .as_deref()
        .is_some_and(|t| constant_time_eq(t, &state.verify_token));
    if !token_matches {
        tracing::warn!(mode = ?params.mode, "webhook verification failed: token mismatch");
        return (StatusCode::FORBIDDEN, VERIFICATION_FAILED.to_string());
    }

    tracing::info!("webhook verified");
    (StatusCode::OK, params.challenge.unwrap_or_default())
}

/// POST /webhook: acknowledge, then process each event on its own task
async fn handle_webhook(State(state): State<AppState>, body: Bytes) -> impl IntoResponse {
    let payload = match serde_json::from_slice::<WebhookPayload>(&body) {
        Ok(payload) if payload.is_page() => payload,
        Ok(payload) => {
            tracing::debug!(object = %payload.object, "ignoring non-page webhook");
            return (StatusCode::NOT_FOUND, NOT_FOUND);
        }
        Err(err) => {
            tracing::warn!("rejecting malformed webhook body: {err}");
            return (StatusCode::NOT_FOUND, NOT_FOUND);
        }
    };

    for event in payload.into_events() {
        let dispatcher = Arc::clone(&state.dispatcher);
        tokio::spawn(async move {
            dispatcher.handle(event).await;
        });
    }

    (StatusCode::OK, EVENT_RECEIVED)
}
