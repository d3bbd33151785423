use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use faceswap_core::pipeline::swap_error::{ImageSide, SwapError};

/// Request-scoped failures, rendered as `{"error": <message>}`.
///
/// The `Display` text is the client-facing message; internal detail is only
/// ever logged.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Missing {0} image")]
    MissingInput(ImageSide),
    #[error("Target image not found")]
    TargetNotFound,
    #[error("Face not detected in {0} image")]
    NoFaceDetected(ImageSide),
    #[error("invalid image data")]
    InvalidImage,
    #[error("invalid multipart body")]
    MalformedUpload(String),
    #[error("upload too large")]
    PayloadTooLarge,
    #[error("server busy")]
    Busy,
    #[error("request timed out")]
    Timeout,
    #[error("internal error")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingInput(_)
            | ApiError::NoFaceDetected(_)
            | ApiError::InvalidImage
            | ApiError::MalformedUpload(_) => StatusCode::BAD_REQUEST,
            ApiError::TargetNotFound => StatusCode::NOT_FOUND,
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Busy => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<SwapError> for ApiError {
    fn from(err: SwapError) -> Self {
        match err {
            SwapError::InvalidImage { side, reason } => {
                log::debug!("Rejected {side} image: {reason}");
                ApiError::InvalidImage
            }
            SwapError::NoFaceDetected { side } => ApiError::NoFaceDetected(side),
            other @ SwapError::Inference { .. } => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge
        } else {
            ApiError::MalformedUpload(err.body_text())
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            ApiError::Internal(detail) => log::error!("Request failed: {detail}"),
            ApiError::MalformedUpload(detail) => log::debug!("Malformed upload: {detail}"),
            other => log::debug!("Request rejected ({status}): {other}"),
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
