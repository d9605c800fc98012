use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use siren_domain::ClassifyError;
use thiserror::Error;
use tokio::task::JoinError;
use tracing::{error, warn};

/// JSON body of every failed request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorBody {
    pub error: String,
    pub kind: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Classify(#[from] ClassifyError),
    #[error("invalid multipart body: {0}")]
    Upload(#[from] MultipartError),
    #[error("worker task failed: {0}")]
    Worker(#[from] JoinError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Classify(err) if err.kind().is_client_error() => StatusCode::BAD_REQUEST,
            ApiError::Classify(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Upload(err) => err.status(),
            ApiError::Worker(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Classify(err) => err.kind().as_str(),
            ApiError::Upload(_) => "upload",
            ApiError::Worker(_) => "internal",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            error: self.to_string(),
            kind: self.kind().to_string(),
        };
        if status.is_server_error() {
            error!(%status, kind = %body.kind, error = %body.error, "request failed");
        } else {
            warn!(%status, kind = %body.kind, error = %body.error, "request rejected");
        }
        (status, Json(body)).into_response()
    }
}
