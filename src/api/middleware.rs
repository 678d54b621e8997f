use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::TenantId;

/// Header carrying the authenticated tenant, set by the upstream auth layer
pub const TENANT_HEADER: &str = "x-tenant-id";

/// Application error types
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Unsupported database type: {0}")]
    UnsupportedEngine(String),

    #[error("Connection test failed: {0}")]
    ConnectionTestFailed(String),

    /// Also used for configs owned by another tenant, so their existence never leaks
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("No active connection for tenant {0}")]
    NoActiveConnection(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorDetail {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let (status, error_detail) = match self {
            AppError::UnsupportedEngine(_) => (
                StatusCode::BAD_REQUEST,
                ErrorDetail::new("UNSUPPORTED_ENGINE", message)
                    .with_details("Supported types: postgresql, mysql"),
            ),
            AppError::ConnectionTestFailed(_) => (
                StatusCode::BAD_REQUEST,
                ErrorDetail::new("CONNECTION_TEST_FAILED", message),
            ),
            AppError::NotFound(_) => (
                StatusCode::NOT_FOUND,
                ErrorDetail::new("NOT_FOUND", message),
            ),
            AppError::NoActiveConnection(_) => (
                StatusCode::BAD_REQUEST,
                ErrorDetail::new("NO_ACTIVE_CONNECTION", message)
                    .with_details("Activate a database connection first."),
            ),
            AppError::Connection(_) => (
                StatusCode::BAD_GATEWAY,
                ErrorDetail::new("CONNECTION_ERROR", message),
            ),
            AppError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("DATABASE_ERROR", message),
            ),
            AppError::Validation(_) => (
                StatusCode::BAD_REQUEST,
                ErrorDetail::new("VALIDATION_ERROR", message),
            ),
            AppError::Unauthorized(_) => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail::new("UNAUTHORIZED", message),
            ),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("INTERNAL_ERROR", message),
            ),
        };

        let body = Json(ErrorResponse {
            error: error_detail,
        });

        (status, body).into_response()
    }
}

/// Convert rusqlite::Error to AppError
impl From<rusqlite::Error> for AppError {
    fn from(err: rusqlite::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

/// Extracts the tenant identifier forwarded by the authentication layer
impl<S> FromRequestParts<S> for TenantId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(TENANT_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| AppError::Unauthorized(format!("missing {} header", TENANT_HEADER)))?;

        Ok(TenantId::new(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_format() {
        let error = AppError::NotFound("Connection not found".to_string());
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_no_active_connection_is_client_error() {
        let response = AppError::NoActiveConnection("t1".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_error_detail_creation() {
        let detail = ErrorDetail::new("TEST_CODE", "Test message");
        assert_eq!(detail.code, "TEST_CODE");
        assert_eq!(detail.message, "Test message");
        assert!(detail.details.is_none());
    }
}
