//! Error types for the crypto payment service.

use exchange_rates::RateError;

use crate::ports::{ExchangeError, GatewayError};

/// Domain-level errors (business logic violations).
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("Amount must be a positive finite number, got {0}")]
    InvalidAmount(f64),

    #[error("Unknown payment status: {0}")]
    UnknownStatus(String),

    #[error("Unknown gateway status: {0}")]
    UnknownGatewayStatus(String),

    #[error("Malformed webhook payload: {0}")]
    MalformedWebhook(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Repository-level errors (data access failures).
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Rates(#[from] RateError),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Entity not found")]
    NotFound,

    #[error("Conflict: {0}")]
    Conflict(String),
}

/// Application-level errors (for HTTP responses).
///
/// Maps cleanly to HTTP status codes.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        AppError::InvalidArgument(err.to_string())
    }
}

impl From<RateError> for AppError {
    fn from(err: RateError) -> Self {
        match err {
            RateError::UnknownCurrency(_) => AppError::NotFound(err.to_string()),
            RateError::DuplicateCurrency(_) => AppError::Conflict(err.to_string()),
            RateError::InvalidAmount(_)
            | RateError::InvalidRate { .. }
            | RateError::BaseCount(_)
            | RateError::BaseDeactivation(_) => AppError::InvalidArgument(err.to_string()),
        }
    }
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::Domain(e) => AppError::Internal(e.to_string()),
            RepoError::Rates(e) => AppError::Internal(e.to_string()),
            RepoError::NotFound => AppError::NotFound("Resource not found".into()),
            RepoError::Database(e) => AppError::Internal(e),
            RepoError::Transaction(e) => AppError::Internal(e),
            RepoError::Conflict(e) => AppError::Conflict(e),
        }
    }
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        AppError::Upstream(format!("gateway unavailable: {}", err))
    }
}

impl From<ExchangeError> for AppError {
    fn from(err: ExchangeError) -> Self {
        AppError::Upstream(format!("rate provider unavailable: {}", err))
    }
}
