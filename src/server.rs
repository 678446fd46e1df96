/// HTTP boundary: a loopback axum service exposing redact/rehydrate and the
/// session operations.
///
/// The vault is open before the listener binds; SIGTERM (or ctrl-c) drains
/// in-flight requests and stops any NER helper process before exit.
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::RedactorConfig;
use crate::constants::DEFAULT_SESSION;
use crate::error::{RedactorError, Result};
use crate::redactor::Redactor;
use crate::vault::{open_vault, Vault};

#[derive(Clone)]
pub struct AppState {
    pub redactor: Arc<Redactor>,
    pub vault: Arc<dyn Vault>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/redact", post(redact))
        .route("/redact-text", post(redact_text))
        .route("/rehydrate", post(rehydrate))
        .route("/clear", post(clear))
        .route("/health", get(health))
        .route("/sessions", get(sessions))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind, serve, drain on signal, then shut the NER helper down.
pub async fn serve(config: RedactorConfig) -> Result<()> {
    let vault = open_vault(&config)?;
    let redactor = Arc::new(Redactor::from_config(&config, Arc::clone(&vault))?);
    let state = AppState {
        redactor: Arc::clone(&redactor),
        vault,
    };

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| RedactorError::Internal(format!("cannot bind {addr}: {e}")))?;
    info!(%addr, backend = state.vault.backend_name(), "pii-redactor listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| RedactorError::Internal(format!("server error: {e}")))?;

    redactor.shutdown().await;
    info!("drained; vault closed");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
    info!("shutdown signal received; draining in-flight requests");
}

struct ApiError(RedactorError);

impl From<RedactorError> for ApiError {
    fn from(err: RedactorError) -> Self {
        ApiError(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError(RedactorError::InvalidInput(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            RedactorError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            RedactorError::VaultUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %self.0, "request aborted");
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

fn session_or_default(session_id: Option<String>) -> String {
    match session_id {
        Some(id) if !id.is_empty() => id,
        _ => DEFAULT_SESSION.to_string(),
    }
}

#[derive(Debug, Deserialize)]
struct RedactRequest {
    session_id: Option<String>,
    messages: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct TextRequest {
    session_id: Option<String>,
    text: String,
}

#[derive(Debug, Deserialize)]
struct ClearRequest {
    session_id: Option<String>,
}

async fn redact(
    State(state): State<AppState>,
    payload: std::result::Result<Json<RedactRequest>, JsonRejection>,
) -> std::result::Result<Json<Value>, ApiError> {
    let Json(request) = payload?;
    let session = session_or_default(request.session_id);
    let messages = state.redactor.redact_messages(&session, request.messages).await?;
    Ok(Json(json!({ "messages": messages })))
}

async fn redact_text(
    State(state): State<AppState>,
    payload: std::result::Result<Json<TextRequest>, JsonRejection>,
) -> std::result::Result<Json<Value>, ApiError> {
    let Json(request) = payload?;
    let session = session_or_default(request.session_id);
    let result = state.redactor.redact(&session, &request.text).await?;
    Ok(Json(json!({
        "text": result.text,
        "entities": result.entities,
        "token_count": result.token_count,
    })))
}

async fn rehydrate(
    State(state): State<AppState>,
    payload: std::result::Result<Json<TextRequest>, JsonRejection>,
) -> std::result::Result<Json<Value>, ApiError> {
    let Json(request) = payload?;
    let session = session_or_default(request.session_id);
    let text = state.vault.rehydrate(&session, &request.text)?;
    Ok(Json(json!({ "text": text })))
}

async fn clear(
    State(state): State<AppState>,
    payload: std::result::Result<Json<ClearRequest>, JsonRejection>,
) -> std::result::Result<Json<Value>, ApiError> {
    let Json(request) = payload?;
    let session = session_or_default(request.session_id);
    state.vault.delete_session(&session)?;
    Ok(Json(json!({ "status": "cleared" })))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "presidio": state.redactor.ner_ready().await,
        "backend": state.vault.backend_name(),
        "scanners": state.redactor.scanner_count(),
    }))
}

async fn sessions(
    State(state): State<AppState>,
) -> std::result::Result<Json<Value>, ApiError> {
    let sessions = state.vault.list_sessions()?;
    Ok(Json(json!({ "sessions": sessions })))
}
