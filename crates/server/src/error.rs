//! API error type with canonical short bodies.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Errors surfaced by the HTTP handlers.
///
/// Client-facing bodies are short canonical messages; internal causes are
/// logged with context and never leak to the client.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Malformed ID")]
    MalformedId,

    #[error("Set not found")]
    SetNotFound,

    #[error("The beatmap could not be downloaded right now")]
    Unavailable,

    #[error("database error: {0}")]
    Model(#[from] ricotta_models::ModelError),

    #[error("download error: {0}")]
    Download(#[from] ricotta_downloader::DownloadError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::MalformedId | Self::Unavailable => StatusCode::BAD_REQUEST,
            Self::SetNotFound => StatusCode::NOT_FOUND,
            Self::Model(_) | Self::Download(_) | Self::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
            "Internal error".to_string()
        } else {
            self.to_string()
        };
        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
