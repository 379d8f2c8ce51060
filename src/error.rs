//! Error taxonomy for the lead pipeline core.
//!
//! `AppError` is not a transport-facing type: it is the vocabulary runners use
//! internally to classify adapter failures before recording them on a `Job`.

use thiserror::Error;

/// Error kinds a stage runner can produce. Matches the taxonomy, not the
/// underlying cause - two different adapters failing the same way both map
/// to the same variant.
#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed payload; surfaced as 400, job never enqueued.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Job id / lead id unknown.
    #[error("not found: {0}")]
    NotFound(String),

    /// Upstream failure a retry can plausibly fix (HTTP 5xx, network, DB lock).
    #[error("transient error: {0}")]
    Transient(String),

    /// An AI call returned unusable output; the dimension is nulled, the job continues.
    #[error("quality error: {0}")]
    Quality(String),

    /// Backup write failure, filesystem full, required config missing. Job fails,
    /// worker logs and continues - this is the only kind that may also abort a worker task.
    #[error("fatal error: {0}")]
    Fatal(String),

    /// Deadline exceeded.
    #[error("timeout after {0:?}")]
    Timeout(std::time::Duration),

    /// Cooperative cancellation was honoured.
    #[error("cancelled")]
    Cancelled,
}

impl AppError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(msg.into())
    }

    pub fn fatal(msg: impl Into<String>) -> Self {
        Self::Fatal(msg.into())
    }

    /// Whether a caller may retry this error a bounded number of times.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::Timeout(_))
    }

    /// The taxonomy label, stable across Display changes - used as the
    /// `kind` field on structured log events and in job.error strings.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::NotFound(_) => "not_found",
            Self::Transient(_) => "transient",
            Self::Quality(_) => "quality",
            Self::Fatal(_) => "fatal",
            Self::Timeout(_) => "timeout",
            Self::Cancelled => "cancelled",
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        Self::Fatal(format!("io error: {e}"))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout(std::time::Duration::from_secs(0))
        } else if e.is_connect() || e.status().map(|s| s.is_server_error()).unwrap_or(false) {
            Self::Transient(e.to_string())
        } else {
            Self::InvalidInput(e.to_string())
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => Self::Transient(e.to_string()),
            sqlx::Error::RowNotFound => Self::NotFound(e.to_string()),
            _ => Self::Fatal(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        Self::InvalidInput(format!("json error: {e}"))
    }
}

impl From<anyhow::Error> for AppError {
    fn from(e: anyhow::Error) -> Self {
        Self::Fatal(format!("{e:#}"))
    }
}

pub type CoreResult<T> = std::result::Result<T, AppError>;

/// Wrapper that makes `AppError` usable as an axum response body / status.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(e: AppError) -> Self {
        Self(e)
    }
}

impl axum::response::IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;
        let status = match &self.0 {
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Cancelled => StatusCode::CONFLICT,
            AppError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Quality(_) | AppError::Fatal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = serde_json::json!({
            "error": self.0.kind(),
            "message": self.0.to_string(),
        });
        (status, axum::Json(body)).into_response()
    }
}
