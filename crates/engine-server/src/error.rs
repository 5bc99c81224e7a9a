use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use engine_core::EngineError;
use serde_json::json;

/// HTTP-facing error wrapper. Maps each `EngineError` kind to a status code
/// and error code, and sanitizes the message before it leaves the process
/// (no file paths, no credentials — internal errors collapse to a generic
/// message).
pub struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
    request_id: Option<String>,
}

impl AppError {
    pub fn with_request_id(mut self, request_id: String) -> Self {
        self.request_id = Some(request_id);
        self
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "VALIDATION_ERROR",
            message: message.into(),
            request_id: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            code: "NOT_FOUND",
            message: message.into(),
            request_id: None,
        }
    }
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        let (status, code) = match &err {
            EngineError::ValidationError(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            EngineError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            EngineError::DuplicateContent(_) => (StatusCode::CONFLICT, "DUPLICATE_CONTENT"),
            EngineError::StoreUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "STORE_UNAVAILABLE"),
            EngineError::ConnectionExhausted => (StatusCode::SERVICE_UNAVAILABLE, "CONNECTION_EXHAUSTED"),
            EngineError::EmbedderUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "EMBEDDER_UNAVAILABLE"),
            EngineError::RerankerUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "RERANKER_UNAVAILABLE"),
            EngineError::LlmUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "LLM_UNAVAILABLE"),
            EngineError::RateLimited { .. } => (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED"),
            EngineError::ChunkingError { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "CHUNKING_ERROR"),
            EngineError::Cancelled => (StatusCode::INTERNAL_SERVER_ERROR, "CANCELLED"),
            EngineError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL"),
        };

        let message = match &err {
            EngineError::Internal(_) => "internal server error".to_string(),
            other => other.to_string(),
        };

        Self { status, code, message, request_id: None }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": self.code,
            "message": self.message,
            "details": null,
            "request_id": self.request_id,
        });
        (self.status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
