//! Webhook transport: an axum endpoint that acknowledges immediately and queues the update.
//!
//! `POST <path>` checks the optional secret token, parses the Telegram update and answers
//! `200 {"status":"ok"}` before any processing. `GET /health` is a liveness probe.
//! [`WebhookSource`] hands the queued updates to the run loop.

use crate::adapters::telegram_update_to_core_with_payload;
use crate::config::WebhookConfig;
use crate::shutdown::Shutdown;
use crate::source::UpdateSource;
use async_trait::async_trait;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use dbot_core::Update;
use serde_json::json;
use std::future::IntoFuture;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

pub const SECRET_TOKEN_HEADER: &str = "x-telegram-bot-api-secret-token";

#[derive(Clone)]
struct WebhookState {
    tx: mpsc::UnboundedSender<Update>,
    secret_token: Option<Arc<str>>,
}

/// Router plus the source its accepted updates flow into.
pub fn webhook(config: &WebhookConfig, shutdown: Shutdown) -> (Router, WebhookSource) {
    let (tx, rx) = mpsc::unbounded_channel();
    let source = WebhookSource {
        rx,
        shutdown,
        draining: false,
    };
    (router(config, tx), source)
}

pub fn router(config: &WebhookConfig, tx: mpsc::UnboundedSender<Update>) -> Router {
    let state = WebhookState {
        tx,
        secret_token: config.secret_token.as_deref().map(Arc::from),
    };
    Router::new()
        .route(&config.route_path(), post(receive_update))
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({"status": "ok", "bot": "healthy"}))
}

async fn receive_update(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Some(expected) = &state.secret_token {
        let provided = headers
            .get(SECRET_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok());
        if provided != Some(expected.as_ref()) {
            warn!("Invalid webhook secret token");
            return (StatusCode::UNAUTHORIZED, Json(json!({"detail": "Unauthorized"}))).into_response();
        }
    }

    let parsed = serde_json::from_slice::<serde_json::Value>(&body).and_then(|payload| {
        serde_json::from_value::<teloxide::types::Update>(payload.clone()).map(|update| (update, payload))
    });
    let (update, payload) = match parsed {
        Ok(parsed) => parsed,
        Err(e) => {
            error!(error = %e, "Failed to parse update");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"detail": "Invalid update format"})),
            )
                .into_response();
        }
    };

    let update_id = update.id.0;
    match telegram_update_to_core_with_payload(&update, payload) {
        Some(core) => {
            if state.tx.send(core).is_err() {
                // Source already closed; Telegram will redeliver after restart.
                warn!(update_id, "Webhook source closed, update dropped");
            } else {
                debug!(update_id, "step: webhook update queued");
            }
        }
        None => debug!(update_id, "Skipping non-message update"),
    }

    (StatusCode::OK, Json(json!({"status": "ok"}))).into_response()
}

pub struct WebhookSource {
    rx: mpsc::UnboundedReceiver<Update>,
    shutdown: Shutdown,
    draining: bool,
}

#[async_trait]
impl UpdateSource for WebhookSource {
    /// After shutdown, keeps handing out updates accepted by in-flight requests until the
    /// router is gone or the shared shutdown deadline passes.
    async fn next_update(&mut self) -> Option<Update> {
        if !self.draining {
            tokio::select! {
                biased;
                update = self.rx.recv() => return update,
                _ = self.shutdown.triggered() => {
                    info!("step: webhook source draining");
                    self.draining = true;
                }
            }
        }
        match tokio::time::timeout_at(self.shutdown.deadline(), self.rx.recv()).await {
            Ok(update) => update,
            Err(_) => {
                warn!("Webhook drain grace elapsed");
                None
            }
        }
    }
}

/// Serves `router` on `listener` until `shutdown`, then stops accepting and gives in-flight
/// requests until the shutdown deadline before closing.
pub async fn serve_webhook(
    listener: TcpListener,
    router: Router,
    shutdown: Shutdown,
) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    info!(addr = %addr, "Webhook server listening");

    let signal = shutdown.token();
    let server = axum::serve(listener, router)
        .with_graceful_shutdown(async move { signal.cancelled().await })
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => result?,
        _ = async {
            shutdown.triggered().await;
            tokio::time::sleep_until(shutdown.deadline()).await;
        } => {
            warn!(
                grace_ms = shutdown.grace().as_millis() as u64,
                "Webhook requests still in flight at shutdown deadline, closing"
            );
        }
    }
    info!("Webhook server stopped");
    Ok(())
}
