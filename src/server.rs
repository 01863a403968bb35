//! HTTP wrapper around [`run_analysis`](crate::analysis::AnalysisService::run_analysis).
//!
//! `POST /api/analyze` takes a multipart upload with a `file` field and
//! answers with the analysis or an [`ErrorBody`]. Each request gets its own
//! cancellation token, fired when the per-request deadline passes.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use axum::extract::multipart::MultipartError;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::analysis::{ErrorBody, LiveService};
use crate::config::Config;
use crate::provider::DocumentPayload;

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Clone)]
pub struct AppState {
    service: Arc<LiveService>,
    deadline: Duration,
}

impl AppState {
    pub fn new(service: LiveService, deadline: Duration) -> Self {
        Self {
            service: Arc::new(service),
            deadline,
        }
    }
}

pub fn build_router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/analyze", post(analyze))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Binds and serves until Ctrl+C or SIGTERM. In-flight requests are allowed
/// to finish.
pub async fn serve(config: &Config, bind_override: Option<String>) -> anyhow::Result<()> {
    let service = LiveService::from_config(config, true)?;
    let state = AppState::new(service, Duration::from_secs(config.server.request_deadline_secs));
    let app = build_router(state, config.server.max_upload_bytes);

    let bind = bind_override.unwrap_or_else(|| config.server.bind.clone());
    let addr: SocketAddr = bind.parse().with_context(|| format!("invalid bind address '{bind}'"))?;

    tracing::info!(
        %addr,
        max_upload_bytes = config.server.max_upload_bytes,
        deadline_secs = config.server.request_deadline_secs,
        report = config.llm.is_enabled(),
        "starting server"
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server shutdown complete");
    Ok(())
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn analyze(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let payload = match read_upload(&mut multipart).await {
        Ok(payload) => payload,
        Err(rejection) => return rejection.into_response(),
    };

    let cancel = CancellationToken::new();
    let run = state.service.run_analysis(&payload, &cancel);
    tokio::pin!(run);

    let result = tokio::select! {
        result = &mut run => result,
        _ = tokio::time::sleep(state.deadline) => {
            tracing::warn!(deadline_secs = state.deadline.as_secs_f64(), "request deadline passed, cancelling");
            cancel.cancel();
            run.await
        }
    };

    match result {
        Ok(analysis) => (StatusCode::OK, Json(analysis)).into_response(),
        Err(err) => (err.http_status(), Json(err.to_body())).into_response(),
    }
}

/// Pulls the first file field out of the upload.
async fn read_upload(multipart: &mut Multipart) -> Result<DocumentPayload, UploadRejection> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") && field.file_name().is_none() {
            continue;
        }

        let content_type = field.content_type().unwrap_or(FALLBACK_CONTENT_TYPE).to_string();
        let bytes = field.bytes().await?;
        return DocumentPayload::new(bytes, content_type)
            .map_err(|err| UploadRejection::invalid(err.to_string()));
    }

    Err(UploadRejection::invalid("upload has no 'file' field"))
}

#[derive(Debug)]
struct UploadRejection {
    status: StatusCode,
    message: String,
}

impl UploadRejection {
    fn invalid(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<MultipartError> for UploadRejection {
    fn from(err: MultipartError) -> Self {
        Self {
            status: err.status(),
            message: err.body_text(),
        }
    }
}

impl IntoResponse for UploadRejection {
    fn into_response(self) -> Response {
        let kind = if self.status == StatusCode::PAYLOAD_TOO_LARGE {
            "payload_too_large"
        } else {
            "invalid_input"
        };
        tracing::debug!(status = self.status.as_u16(), message = %self.message, "upload rejected");
        let body = ErrorBody {
            error: self.message,
            status: self.status.as_u16(),
            details: serde_json::json!({ "kind": kind }),
        };
        (self.status, Json(body)).into_response()
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
