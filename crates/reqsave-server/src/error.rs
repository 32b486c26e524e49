use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

use reqsave_saver::SaverError;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("failed to read request body: {0}")]
    Body(String),

    #[error("save failed: {0}")]
    Saver(#[from] SaverError),

    #[error("store error: {0}")]
    Store(#[from] reqsave_store::StoreError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// HTTP status reported to the client.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Saver(e) if e.is_too_many() => StatusCode::TOO_MANY_REQUESTS,
            Self::Body(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Server faults are logged here and reach the client as an opaque message.
impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match status {
            StatusCode::INTERNAL_SERVER_ERROR => {
                error!(error = %self, "request not saved");
                "Unexpected Error"
            }
            StatusCode::TOO_MANY_REQUESTS => "Too Many Requests",
            StatusCode::PAYLOAD_TOO_LARGE => "Payload Too Large",
            _ => "Bad Request",
        };
        (status, message).into_response()
    }
}

pub type ServerResult<T> = Result<T, ServerError>;
