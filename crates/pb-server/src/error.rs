use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error(transparent)]
    Compute(#[from] pb_compute::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Compute(e) if e.is_not_found() => StatusCode::NOT_FOUND,
            ApiError::Compute(pb_compute::Error::InvalidId(_)) => StatusCode::BAD_REQUEST,
            ApiError::Compute(pb_compute::Error::ManagerClosed) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Compute(_) => StatusCode::BAD_GATEWAY,
        };

        if status.is_server_error() {
            tracing::warn!(status = %status, error = %self, "request failed");
        }

        let body = serde_json::json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}
