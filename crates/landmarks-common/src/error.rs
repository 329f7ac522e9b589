//! Error types shared across the landmark webhook services.

use thiserror::Error;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Kind of failure from the external geospatial query service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternalErrorKind {
    Timeout,
    Transport,
    BadResponse,
    HttpStatus,
}

/// Primary error type for the landmark webhook pipeline.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("authentication failed: {0}")]
    AuthFailure(String),

    #[error("external service error ({kind:?}): {message}")]
    ExternalError {
        kind: ExternalErrorKind,
        message: String,
    },

    #[error("queue error: {0}")]
    QueueError(String),

    #[error("store error: {0}")]
    StoreError(String),

    #[error("cache error: {0}")]
    CacheError(String),

    #[error("internal error: {0}")]
    InternalError(String),
}

impl Error {
    /// HTTP status code this error maps to per the error envelope contract.
    pub fn http_status_code(&self) -> u16 {
        match self {
            Error::InvalidInput(_) => 400,
            Error::AuthFailure(_) => 401,
            Error::ExternalError { .. } => 502,
            Error::QueueError(_) => 502,
            Error::StoreError(_) => 500,
            Error::CacheError(_) => 500,
            Error::InternalError(_) => 500,
        }
    }

    /// Machine-readable error code used in the JSON error envelope.
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::InvalidInput(_) => "VALIDATION_ERROR",
            Error::AuthFailure(_) => "UNAUTHORIZED",
            Error::ExternalError { .. } => "OVERPASS_ERROR",
            Error::QueueError(_) => "WEBHOOK_PROCESSING_ERROR",
            Error::StoreError(_) | Error::CacheError(_) | Error::InternalError(_) => {
                "INTERNAL_ERROR"
            }
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::InternalError(format!("JSON error: {err}"))
    }
}
