//! Error handling

use axum::{
    response::{IntoResponse, Response},
    http::StatusCode,
    Json,
};
use serde_json::json;

use crate::classifier::ClassifierError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Auth errors
    #[error("authentication required")]
    Unauthorized,
    #[error("access denied")]
    Forbidden,

    // Resource errors
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    AlreadyExists(String),
    #[error("{0}")]
    InvalidTransition(String),

    // Validation errors
    #[error("{0}")]
    ValidationError(String),
    #[error("Image preprocessing failed: {0}")]
    BadImage(String),
    #[error("{0}")]
    PayloadTooLarge(String),

    // Database errors
    #[error("database error: {0}")]
    DatabaseError(String),

    // Model errors
    #[error("prediction failed: {0}")]
    InferenceError(String),

    // Generic errors
    #[error("internal error: {0}")]
    InternalError(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::AlreadyExists(_) | AppError::InvalidTransition(_) => StatusCode::CONFLICT,
            AppError::ValidationError(_) | AppError::BadImage(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::DatabaseError(_)
            | AppError::InferenceError(_)
            | AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_message = match &self {
            AppError::Unauthorized => "Authentication required".to_string(),
            AppError::Forbidden => "Access denied".to_string(),
            AppError::NotFound(msg)
            | AppError::AlreadyExists(msg)
            | AppError::InvalidTransition(msg)
            | AppError::ValidationError(msg)
            | AppError::PayloadTooLarge(msg) => msg.clone(),
            AppError::BadImage(_) => self.to_string(),
            AppError::DatabaseError(msg) => {
                tracing::error!("Database error: {}", msg);
                "Database error occurred".to_string()
            }
            AppError::InferenceError(msg) => {
                tracing::error!("Inference error: {}", msg);
                "Prediction failed".to_string()
            }
            AppError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal server error".to_string()
            }
        };

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::DatabaseError(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        let fields: Vec<String> = err
            .field_errors()
            .keys()
            .map(|field| field.to_string())
            .collect();
        AppError::ValidationError(format!("Invalid fields: {}", fields.join(", ")))
    }
}

impl From<ClassifierError> for AppError {
    fn from(err: ClassifierError) -> Self {
        match err {
            ClassifierError::Decode(msg) => AppError::BadImage(msg),
            other => AppError::InferenceError(other.to_string()),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(err.to_string())
    }
}

impl From<axum::extract::multipart::MultipartError> for AppError {
    fn from(err: axum::extract::multipart::MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return AppError::PayloadTooLarge("Upload exceeds the request size limit".to_string());
        }
        AppError::ValidationError(format!("Invalid multipart body: {}", err.body_text()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_errors_to_status_codes() {
        assert_eq!(AppError::NotFound("x".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::InvalidTransition("x".into()).status_code(), StatusCode::CONFLICT);
        assert_eq!(AppError::BadImage("x".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AppError::PayloadTooLarge("x".into()).status_code(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
    }

    #[test]
    fn decode_failures_are_client_errors() {
        let err: AppError = ClassifierError::Decode("bad header".into()).into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Image preprocessing failed: bad header");

        let err: AppError = ClassifierError::OutputMismatch { expected: 10, actual: 3 }.into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
