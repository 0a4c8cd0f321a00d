//! Error types for wildwatch.

use thiserror::Error;

/// Application result type.
pub type AppResult<T> = Result<T, AppError>;

/// Application error type.
#[derive(Debug, Error)]
pub enum AppError {
    // === Client Errors ===
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Already following this creator")]
    AlreadyFollowing,

    #[error("Not currently following this creator")]
    NotFollowing,

    #[error("Rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    // === Store Errors ===
    #[error("Transaction conflict: {0}")]
    TransactionConflict(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    // === Server Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::UserNotFound(_) => "USER_NOT_FOUND",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::AlreadyFollowing => "ALREADY_FOLLOWING",
            Self::NotFollowing => "NOT_FOLLOWING",
            Self::RateLimited { .. } => "RATE_LIMITED",
            Self::TransactionConflict(_) => "TRANSACTION_CONFLICT",
            Self::Unavailable(_) => "STORE_UNAVAILABLE",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns whether retrying the same operation may succeed.
    ///
    /// Only transient store faults qualify. Precondition violations such as
    /// [`AppError::AlreadyFollowing`] are terminal.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(self, Self::TransactionConflict(_) | Self::Unavailable(_))
    }

    /// Returns whether this error is caused by the caller rather than the system.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_)
                | Self::UserNotFound(_)
                | Self::BadRequest(_)
                | Self::Validation(_)
                | Self::AlreadyFollowing
                | Self::NotFollowing
                | Self::RateLimited { .. }
        )
    }
}

// === From implementations ===

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
