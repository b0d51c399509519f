//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.

use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::storage::StorageError;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// A storage account operation failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// The upload body could not be read.
    #[error("Malformed upload: {0}")]
    Multipart(#[from] MultipartError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            Self::Storage(_) => {
                let event_id = sentry::capture_error(&self);
                tracing::error!(
                    error = %self,
                    sentry_event_id = %event_id,
                    "Request error"
                );
            }
            Self::Multipart(_) => {
                tracing::debug!(error = %self, "Rejected upload");
            }
        }

        // Don't expose storage details to clients
        let (status, message) = match &self {
            Self::Storage(_) => (StatusCode::BAD_GATEWAY, "Storage service error".to_string()),
            Self::Multipart(err) => (err.status(), err.body_text()),
        };

        (status, message).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn storage_error() -> StorageError {
        StorageError::Service {
            status: 403,
            code: "AuthenticationFailed".to_string(),
            message: "Server failed to authenticate the request".to_string(),
        }
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::from(storage_error());
        assert_eq!(
            err.to_string(),
            "Storage error: storage service returned 403 (AuthenticationFailed): Server failed to authenticate the request"
        );
    }

    #[tokio::test]
    async fn test_storage_error_is_bad_gateway_without_details() {
        let response = AppError::from(storage_error()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap_or_default();
        let body = String::from_utf8_lossy(&body);
        assert!(!body.contains("AuthenticationFailed"));
    }
}
