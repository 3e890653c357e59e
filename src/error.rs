//! HTTP-facing error type

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::download::DownloadError;
use crate::generation::{GenerationError, InvalidRequest};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid request body: {}", .0.body_text())]
    InvalidBody(#[from] JsonRejection),

    #[error(transparent)]
    InvalidRequest(#[from] InvalidRequest),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Download(#[from] DownloadError),
}

/// Error body returned by every API endpoint
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ApiError,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidBody(rejection) => rejection.status(),
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Generation(_) => StatusCode::BAD_GATEWAY,
            AppError::Download(DownloadError::InvalidReference | DownloadError::Decode(_)) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Download(_) => StatusCode::BAD_GATEWAY,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::InvalidBody(_) => "INVALID_BODY",
            AppError::InvalidRequest(e) => e.code(),
            AppError::Generation(GenerationError::Transport(_)) => "WEBHOOK_UNREACHABLE",
            AppError::Generation(GenerationError::Status { .. }) => "WEBHOOK_STATUS",
            AppError::Generation(GenerationError::ResponseTooLarge(_)) => "WEBHOOK_RESPONSE_TOO_LARGE",
            AppError::Generation(GenerationError::Normalize(e)) => e.code(),
            AppError::Download(e) => e.code(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(code = self.code(), error = %self, "Request failed");
        }

        let body = ErrorResponse {
            success: false,
            error: ApiError {
                code: self.code().to_string(),
                message: self.to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::NormalizeError;

    #[test]
    fn test_status_and_code_mapping() {
        let err = AppError::from(InvalidRequest::MissingStyle);
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), "MISSING_STYLE");

        let err = AppError::from(GenerationError::from(NormalizeError::InvalidJson("eof".into())));
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.code(), "INVALID_JSON");
        assert!(err.to_string().contains("eof"));

        let err = AppError::from(GenerationError::Status { status: 500, body: String::new() });
        assert_eq!(err.code(), "WEBHOOK_STATUS");

        let err = AppError::from(DownloadError::Status(404));
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.code(), "DOWNLOAD_FAILED");
    }
}
