use mald_core::ServiceError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("result not found: {0}")]
    ResultNotFound(String),

    #[error("server is busy")]
    Busy,

    #[error("classification failed: {0}")]
    ClassificationFailed(String),

    #[error("upload failed: {0}")]
    Upload(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Message placed in the `{"error": ...}` response body.
    pub fn public_message(&self) -> String {
        match self {
            ApiError::InvalidRequest(msg) => msg.clone(),
            ApiError::ResultNotFound(_) => "Result not found or expired.".to_string(),
            ApiError::Busy => "Server is busy. Please try again later.".to_string(),
            ApiError::ClassificationFailed(_) => "Failed to classify file".to_string(),
            ApiError::Upload(_) => "Failed to store uploaded file".to_string(),
            ApiError::Internal(_) => "Internal server error".to_string(),
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Busy => ApiError::Busy,
            ServiceError::Upload(e) => ApiError::Upload(e.to_string()),
            ServiceError::Classification(e) => ApiError::ClassificationFailed(e.to_string()),
            ServiceError::Store(e) => ApiError::Internal(e.to_string()),
        }
    }
}

#[cfg(feature = "http")]
impl axum::response::IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;

        let status = match &self {
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::ResultNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Busy => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::ClassificationFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Upload(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() && status != StatusCode::SERVICE_UNAVAILABLE {
            tracing::error!(error = %self, "request failed");
        }

        let body = serde_json::json!({ "error": self.public_message() });
        (status, axum::Json(body)).into_response()
    }
}
