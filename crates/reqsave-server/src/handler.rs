use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::assemble::DynSaver;
use crate::capture::CaptureAdapter;
use crate::error::{ServerError, ServerResult};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub saver: DynSaver,
    pub capture: CaptureAdapter,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".into(),
            version: env!("CARGO_PKG_VERSION").into(),
        }
    }
}

/// Health check handler.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::default())
}

/// Captures the request and saves it.
///
/// `200 saved` on success. Admission rejections give 429, oversized bodies
/// 413, and any other failure 500 with an opaque body.
pub async fn save_handler(State(state): State<AppState>, request: Request) -> Response {
    match save(&state, request).await {
        Ok(bytes) => {
            debug!(bytes, "request persisted");
            (StatusCode::OK, "saved").into_response()
        }
        Err(e) => e.into_response(),
    }
}

async fn save(state: &AppState, request: Request) -> ServerResult<u64> {
    let captured = state.capture.convert(request).await?;
    let saver = state.saver.clone();
    // Sinks block on file and socket I/O.
    let saved = tokio::task::spawn_blocking(move || saver.save(captured.request))
        .await
        .map_err(|e| ServerError::Internal(format!("save task failed: {e}")))?;
    Ok(saved?)
}
