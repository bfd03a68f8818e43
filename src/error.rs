//! Error types for the tweet service.
//!
//! Every failure is surfaced to the caller as a [`TweetError`]. Nothing is
//! retried locally: the unit of work the error happened in is rolled back and
//! the error is returned as-is.

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use log::error;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TweetError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Scheduler error: {0}")]
    Scheduler(#[from] tokio_cron_scheduler::JobSchedulerError),
}

/// Result type alias for service operations
pub type TweetResult<T> = Result<T, TweetError>;

impl TweetError {
    pub fn tweet_not_found(tweet_id: i64) -> Self {
        TweetError::NotFound(format!("tweet {} does not exist", tweet_id))
    }

    pub fn user_not_found(user_id: i64) -> Self {
        TweetError::NotFound(format!("user {} does not exist", user_id))
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            TweetError::NotFound(_) => StatusCode::NOT_FOUND,
            TweetError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            TweetError::Forbidden(_) => StatusCode::FORBIDDEN,
            TweetError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            TweetError::ConstraintViolation(_) => StatusCode::CONFLICT,
            TweetError::Database(_) | TweetError::Scheduler(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Classifies storage failures: uniqueness and foreign-key violations become
/// [`TweetError::ConstraintViolation`], a missing row becomes
/// [`TweetError::NotFound`], anything else is a plain database error.
impl From<sqlx::Error> for TweetError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::RowNotFound = err {
            return TweetError::NotFound("row not found".to_string());
        }
        if let Some(db_err) = err.as_database_error() {
            if db_err.is_unique_violation() || db_err.is_foreign_key_violation() {
                return TweetError::ConstraintViolation(db_err.message().to_string());
            }
        }
        TweetError::Database(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for TweetError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        TweetError::Database(format!("migration failed: {}", err))
    }
}

// Extractor rejections (malformed query strings, bodies or path segments)
// are client errors rendered in the same envelope as every other error.

impl From<QueryRejection> for TweetError {
    fn from(rejection: QueryRejection) -> Self {
        TweetError::InvalidInput(rejection.body_text())
    }
}

impl From<JsonRejection> for TweetError {
    fn from(rejection: JsonRejection) -> Self {
        TweetError::InvalidInput(rejection.body_text())
    }
}

impl From<PathRejection> for TweetError {
    fn from(rejection: PathRejection) -> Self {
        TweetError::InvalidInput(rejection.body_text())
    }
}

/// Renders errors in the same envelope the handlers use:
///
/// ```json
/// {
///   "status": "error",
///   "message": "Not found: tweet 42 does not exist"
/// }
/// ```
impl IntoResponse for TweetError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }
        (
            status,
            Json(json!({"status": "error", "message": self.to_string()})),
        )
            .into_response()
    }
}
