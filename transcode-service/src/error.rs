/// Error types for the transcode service
///
/// Errors are converted to appropriate HTTP responses at the edge; internal
/// detail never crosses into the response body beyond a one-line message.
use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use error_types::ErrorResponse;
use std::fmt;

/// Result type for transcode-service operations
pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug)]
pub enum AppError {
    /// Gap or missing offset on chunk combine.
    ChunkMissing(String),
    /// Probe could not decode the input container.
    UnreadableMedia(String),
    /// Encoder non-zero exit or progress-parse failure on a rung.
    TranscodeFailure { resolution: String, stage: String },
    /// Object-store error survived the retry budget.
    UploadFailure(String),
    /// Cooperative cancellation took effect.
    Cancelled,
    /// Enqueue attempted while a non-terminal job already exists for (resource, type).
    ExistingJob { job_id: String, status: String },
    /// Queue depth exceeded.
    Busy,
    NotFound(String),
    Forbidden(String),
    /// Bad or absent `Range` header.
    RangeNotSatisfiable,
    BadRequest(String),
    Conflict(String),
    DatabaseError(String),
    CacheError(String),
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::ChunkMissing(msg) => write!(f, "chunk missing: {msg}"),
            AppError::UnreadableMedia(msg) => write!(f, "unreadable media: {msg}"),
            AppError::TranscodeFailure { resolution, stage } => {
                write!(f, "transcode failure at {resolution} during {stage}")
            }
            AppError::UploadFailure(msg) => write!(f, "upload failure: {msg}"),
            AppError::Cancelled => write!(f, "cancelled"),
            AppError::ExistingJob { job_id, status } => {
                write!(f, "existing job {job_id} ({status})")
            }
            AppError::Busy => write!(f, "queue is busy"),
            AppError::NotFound(msg) => write!(f, "not found: {msg}"),
            AppError::Forbidden(msg) => write!(f, "forbidden: {msg}"),
            AppError::RangeNotSatisfiable => write!(f, "range not satisfiable"),
            AppError::BadRequest(msg) => write!(f, "bad request: {msg}"),
            AppError::Conflict(msg) => write!(f, "conflict: {msg}"),
            AppError::DatabaseError(msg) => write!(f, "database error: {msg}"),
            AppError::CacheError(msg) => write!(f, "cache error: {msg}"),
            AppError::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::ChunkMissing(_)
            | AppError::UnreadableMedia(_)
            | AppError::TranscodeFailure { .. }
            | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::UploadFailure(_) | AppError::DatabaseError(_) | AppError::CacheError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::Cancelled => StatusCode::OK,
            AppError::ExistingJob { .. } | AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Busy => StatusCode::TOO_MANY_REQUESTS,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::RangeNotSatisfiable => StatusCode::RANGE_NOT_SATISFIABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let (error_type, code) = match self {
            AppError::ChunkMissing(_) => ("validation_error", "CHUNK_MISSING"),
            AppError::UnreadableMedia(_) => ("validation_error", "UNREADABLE_MEDIA"),
            AppError::TranscodeFailure { .. } => ("server_error", "TRANSCODE_FAILURE"),
            AppError::UploadFailure(_) => ("server_error", "UPLOAD_FAILURE"),
            AppError::Cancelled => ("info", "CANCELLED"),
            AppError::ExistingJob { .. } => ("conflict_error", "EXISTING_JOB"),
            AppError::Busy => ("rate_limit_error", "BUSY"),
            AppError::NotFound(_) => ("not_found_error", error_types::error_codes::MEDIA_NOT_FOUND),
            AppError::Forbidden(_) => ("authorization_error", "FORBIDDEN"),
            AppError::RangeNotSatisfiable => ("validation_error", "RANGE_NOT_SATISFIABLE"),
            AppError::BadRequest(_) => ("validation_error", "BAD_REQUEST"),
            AppError::Conflict(_) => ("conflict_error", error_types::error_codes::VERSION_CONFLICT),
            AppError::DatabaseError(_) => {
                ("server_error", error_types::error_codes::DATABASE_ERROR)
            }
            AppError::CacheError(_) => ("server_error", error_types::error_codes::CACHE_ERROR),
            AppError::Internal(_) => (
                "server_error",
                error_types::error_codes::INTERNAL_SERVER_ERROR,
            ),
        };

        let message = self.to_string();
        let response = ErrorResponse::new(
            &match status {
                StatusCode::BAD_REQUEST => "Bad Request",
                StatusCode::UNAUTHORIZED => "Unauthorized",
                StatusCode::FORBIDDEN => "Forbidden",
                StatusCode::NOT_FOUND => "Not Found",
                StatusCode::CONFLICT => "Conflict",
                StatusCode::TOO_MANY_REQUESTS => "Too Many Requests",
                StatusCode::RANGE_NOT_SATISFIABLE => "Range Not Satisfiable",
                StatusCode::INTERNAL_SERVER_ERROR => "Internal Server Error",
                _ => "Error",
            },
            &message,
            status.as_u16(),
            error_type,
            code,
        );

        HttpResponse::build(status).json(response)
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Internal(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Internal(msg.to_string())
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}
