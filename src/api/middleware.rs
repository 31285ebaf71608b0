use axum::{
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::Instrument;
use uuid::Uuid;

use crate::services::invocation_cache::RequestCache;

/// Error raised by the backing store, with the vendor code when the driver exposes one
/// (SQLSTATE for PostgreSQL, `ORA-nnnnn` for Oracle, the error number for SQL Server).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseError {
    pub code: Option<String>,
    pub message: String,
}

impl DatabaseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: message.into(),
        }
    }
}

impl fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "[{}] {}", code, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

/// Application error types
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Database error: {0}")]
    Database(DatabaseError),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Not implemented: {0}")]
    NotImplemented(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Vendor error code of a backing-store failure, if any
    pub fn database_code(&self) -> Option<&str> {
        match self {
            AppError::Database(err) => err.code.as_deref(),
            _ => None,
        }
    }
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
        let (status, error_detail) = match self {
            AppError::Configuration(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("CONFIGURATION_ERROR", msg),
            ),
            AppError::Database(err) => {
                let detail = ErrorDetail::new("DATABASE_ERROR", err.message);
                let detail = match err.code {
                    Some(code) => detail.with_details(format!("Vendor code: {}", code)),
                    None => detail,
                };
                (StatusCode::INTERNAL_SERVER_ERROR, detail)
            }
            AppError::Connection(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorDetail::new("CONNECTION_ERROR", msg),
            ),
            AppError::Transaction(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("TRANSACTION_ERROR", msg),
            ),
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorDetail::new("VALIDATION_ERROR", msg),
            ),
            AppError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                ErrorDetail::new("NOT_FOUND", msg),
            ),
            AppError::NotImplemented(msg) => (
                StatusCode::NOT_IMPLEMENTED,
                ErrorDetail::new("NOT_IMPLEMENTED", msg),
            ),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("INTERNAL_ERROR", msg),
            ),
        };

        let body = Json(ErrorResponse {
            error: error_detail,
        });

        (status, body).into_response()
    }
}

/// Convert anyhow::Error to AppError
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

/// Convert tokio_postgres::Error to AppError, keeping the SQLSTATE
impl From<tokio_postgres::Error> for AppError {
    fn from(err: tokio_postgres::Error) -> Self {
        match err.as_db_error() {
            Some(db_error) => AppError::Database(DatabaseError::with_code(
                db_error.code().code(),
                db_error.message(),
            )),
            None => match err.code() {
                Some(state) => AppError::Database(DatabaseError::with_code(state.code(), err.to_string())),
                None => AppError::Database(DatabaseError::new(err.to_string())),
            },
        }
    }
}

/// Convert deadpool_postgres::PoolError to AppError
impl From<deadpool_postgres::PoolError> for AppError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        AppError::Connection(format!("Failed to get connection from pool: {}", err))
    }
}

fn request_id(headers: &axum::http::HeaderMap) -> String {
    headers
        .get("x-request-id")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// Runs every request inside its own memoization scope.
///
/// The cache is created before the handler runs and dropped when the handler's future
/// completes, including when it returns an error response or panics.
pub async fn request_cache_middleware(request: Request, next: Next) -> Response {
    let request_id = request_id(request.headers());
    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %request.method(),
        uri = %request.uri(),
    );

    async move {
        let (response, stats) = RequestCache::scope(async move {
            let response = next.run(request).await;
            let stats = RequestCache::current().map(|cache| cache.stats());
            (response, stats)
        })
        .await;

        if let Some(stats) = stats {
            tracing::debug!(
                hits = stats.hits,
                misses = stats.misses,
                status = response.status().as_u16(),
                "request cache released"
            );
        }

        response
    }
    .instrument(span)
    .await
}
