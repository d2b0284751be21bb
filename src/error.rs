use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use log::error;
use serde_json::json;

/// Errors returned by the recordings HTTP handlers
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Unknown id, unparsable id, failed lookup or missing file
    #[error("Not found")]
    NotFound,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Multipart(#[from] MultipartError),

    /// Metadata store failure
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// File store failure
    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::NotFound => (StatusCode::NOT_FOUND, "Not found".to_string()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Multipart(e) => (e.status(), e.body_text()),
            ApiError::Database(e) => {
                error!("Database error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
            ApiError::Storage(e) => {
                error!("Storage error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
        };

        (status, axum::Json(json!({ "error": message }))).into_response()
    }
}
