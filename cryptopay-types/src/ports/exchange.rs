//! Exchange rate provider port.
//!
//! Implementations fetch a full rate snapshot from an external rate API.
//! Merging it into the rate table is the application's job.

use std::collections::HashMap;

/// Error type for exchange rate operations.
#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Snapshot keyed by {actual}, expected {expected}")]
    BaseMismatch { expected: String, actual: String },
}

/// Rates for every currency the provider knows, keyed by `base`.
#[derive(Debug, Clone, PartialEq)]
pub struct RateSnapshot {
    pub base: String,
    /// Units of each currency per one unit of `base`
    pub rates: HashMap<String, f64>,
}

/// Port trait for exchange rate providers.
#[async_trait::async_trait]
pub trait ExchangeRateProvider: Send + Sync {
    /// Fetches the latest snapshot keyed by `base`.
    async fn fetch_rates(&self, base: &str) -> Result<RateSnapshot, ExchangeError>;
}
