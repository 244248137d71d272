//! API error types.
//!
//! Pipeline failures reach the caller as `{"detail", "code", "stage"}`.
//! The detail is the pipeline's caller-facing message; the full error is
//! logged server-side only.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use hclip_pipeline::{PipelineError, Stage};

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Pipeline(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            ApiError::Pipeline(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "validation_error",
            ApiError::Internal(_) => "internal_error",
            ApiError::Pipeline(e) => e.code(),
        }
    }

    fn stage(&self) -> Stage {
        match self {
            ApiError::BadRequest(_) | ApiError::Internal(_) => Stage::Intake,
            ApiError::Pipeline(e) => e.stage(),
        }
    }

    fn detail(&self) -> String {
        match self {
            ApiError::BadRequest(msg) => msg.clone(),
            ApiError::Internal(_) => "Internal server error".to_string(),
            ApiError::Pipeline(e) => e.user_message(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub detail: String,
    pub code: String,
    pub stage: Stage,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            error!(code = self.code(), stage = %self.stage(), "Request failed: {}", self);
        }

        let body = ErrorResponse {
            detail: self.detail(),
            code: self.code().to_string(),
            stage: self.stage(),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_status_mapping() {
        let err = ApiError::from(PipelineError::NoAudioContent);
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let err = ApiError::from(PipelineError::SelectionParse("eof".into()));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code(), "selection_parse_error");
        assert_eq!(err.stage(), Stage::Selection);
    }

    #[test]
    fn test_internal_detail_is_generic() {
        let err = ApiError::internal("/srv/videos/output missing");
        assert_eq!(err.detail(), "Internal server error");

        let err = ApiError::from(PipelineError::internal(Stage::Extraction, "ffmpeg segfault"));
        assert_eq!(err.detail(), "Internal server error");
    }
}
