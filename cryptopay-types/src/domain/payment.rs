//! CryptoPayment domain model.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::status::PaymentStatus;
use crate::error::DomainError;

/// How long a payment address stays valid after creation.
pub const PAYMENT_WINDOW_HOURS: i64 = 24;

/// One gateway-tracked payment attempt for an external order.
///
/// Everything except `status`, `transaction_hash` and `updated_at` is fixed
/// at creation. The amount and address are exactly what the gateway quoted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CryptoPayment {
    /// Internal identifier
    pub id: Uuid,
    /// External order this payment settles
    pub order_id: String,
    /// Gateway-assigned identifier
    pub payment_id: String,
    /// Crypto asset, lower case (e.g. `btc`)
    pub currency: String,
    /// Chain the asset is paid on
    pub network: String,
    /// Fiat amount quoted to the gateway
    pub price_amount: f64,
    /// Fiat currency of `price_amount`
    pub price_currency: String,
    /// Crypto amount quoted by the gateway
    pub amount: f64,
    /// Deposit address returned by the gateway
    pub address: String,
    pub status: PaymentStatus,
    /// On-chain transaction, write-once
    pub transaction_hash: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Gateway-quoted fields needed to open a payment.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenPayment {
    pub order_id: String,
    pub payment_id: String,
    pub currency: String,
    pub network: String,
    pub price_amount: f64,
    pub price_currency: String,
    pub amount: f64,
    pub address: String,
}

/// A status report to apply to a payment, from a webhook or a poll.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub status: PaymentStatus,
    pub transaction_hash: Option<String>,
}

impl StatusUpdate {
    /// Builds an update, treating a blank hash as absent.
    pub fn new(status: PaymentStatus, transaction_hash: Option<String>) -> Self {
        Self {
            status,
            transaction_hash: transaction_hash
                .map(|h| h.trim().to_string())
                .filter(|h| !h.is_empty()),
        }
    }
}

/// Result of applying a [`StatusUpdate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Status moved forward from `previous`.
    Applied { previous: PaymentStatus },
    /// Stale or repeated report; nothing changed.
    Ignored,
}

impl Transition {
    pub fn is_applied(&self) -> bool {
        matches!(self, Transition::Applied { .. })
    }
}

impl CryptoPayment {
    /// Opens a new payment in `NEW`, expiring [`PAYMENT_WINDOW_HOURS`] after `now`.
    pub fn open(quote: OpenPayment, now: DateTime<Utc>) -> Result<Self, DomainError> {
        if quote.order_id.trim().is_empty() {
            return Err(DomainError::ValidationError("order_id cannot be empty".into()));
        }
        if quote.payment_id.trim().is_empty() {
            return Err(DomainError::ValidationError(
                "gateway returned an empty payment_id".into(),
            ));
        }
        if quote.address.trim().is_empty() {
            return Err(DomainError::ValidationError(
                "gateway returned an empty pay_address".into(),
            ));
        }
        if !quote.amount.is_finite() || quote.amount <= 0.0 {
            return Err(DomainError::InvalidAmount(quote.amount));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            order_id: quote.order_id,
            payment_id: quote.payment_id,
            currency: quote.currency.to_lowercase(),
            network: quote.network,
            price_amount: quote.price_amount,
            price_currency: quote.price_currency.to_lowercase(),
            amount: quote.amount,
            address: quote.address,
            status: PaymentStatus::New,
            transaction_hash: None,
            expires_at: now + Duration::hours(PAYMENT_WINDOW_HOURS),
            created_at: now,
            updated_at: now,
        })
    }

    /// Non-terminal and still inside its payment window.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        !self.status.is_terminal() && self.expires_at > now
    }

    /// Candidate for the expiry sweep.
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        matches!(
            self.status,
            PaymentStatus::New | PaymentStatus::Confirming
        ) && self.expires_at <= now
    }

    /// Returns the stored hash when `incoming` would contradict it.
    pub fn conflicting_hash(&self, incoming: Option<&str>) -> Option<&str> {
        match (self.transaction_hash.as_deref(), incoming) {
            (Some(stored), Some(new)) if !new.is_empty() && stored != new => Some(stored),
            _ => None,
        }
    }

    /// Applies `update` under the monotonic transition rule.
    pub fn apply(&mut self, update: &StatusUpdate, now: DateTime<Utc>) -> Transition {
        if !self.status.can_advance_to(update.status) {
            return Transition::Ignored;
        }

        let previous = self.status;
        self.status = update.status;
        if self.transaction_hash.is_none() {
            self.transaction_hash = update.transaction_hash.clone();
        }
        self.updated_at = now;
        Transition::Applied { previous }
    }
}
