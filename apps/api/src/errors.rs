use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::JsonRejection,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::analysis::analyzer::{AnalysisError, AnalysisResponse, ExtractionError};

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
/// Every error renders as the analysis envelope: `{"data": null, "error": "..."}`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),

    /// The request never reached an analysis: unreadable body or wrong method.
    #[error("{message}")]
    Rejected { status: StatusCode, message: String },

    #[error(transparent)]
    Analysis(#[from] AnalysisError),
}

/// Malformed, mistyped or untyped JSON bodies are all 400. Body read failures
/// keep their own status so oversized uploads stay 413.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        let status = match &rejection {
            JsonRejection::BytesRejection(_) => rejection.status(),
            _ => StatusCode::BAD_REQUEST,
        };
        AppError::Rejected {
            status,
            message: rejection.body_text(),
        }
    }
}

impl From<MultipartRejection> for AppError {
    fn from(rejection: MultipartRejection) -> Self {
        AppError::Rejected {
            status: StatusCode::BAD_REQUEST,
            message: rejection.body_text(),
        }
    }
}

impl From<MultipartError> for AppError {
    fn from(error: MultipartError) -> Self {
        AppError::Rejected {
            status: error.status(),
            message: error.body_text(),
        }
    }
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Rejected { status, .. } => *status,
            AppError::Analysis(AnalysisError::Validation(_)) => StatusCode::BAD_REQUEST,
            AppError::Analysis(AnalysisError::Extraction {
                source: ExtractionError::UnreadableAttachment(_),
                ..
            }) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            AppError::Analysis(AnalysisError::Extraction { .. }) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        match &self {
            AppError::Analysis(AnalysisError::Extraction {
                source: ExtractionError::MalformedResponse(details),
                kind,
            }) => tracing::error!("Malformed {kind} response from LLM: {details}"),
            AppError::Analysis(AnalysisError::Extraction {
                source: ExtractionError::UpstreamFailure(details),
                kind,
            }) => tracing::error!("LLM error during {kind}: {details}"),
            AppError::Rejected { message, .. } => tracing::debug!("Rejected request: {message}"),
            _ => {}
        }

        let body = Json(AnalysisResponse::<()>::failure(self.to_string()));
        (status, body).into_response()
    }
}
