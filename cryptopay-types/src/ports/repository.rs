//! Repository port traits.
//!
//! Adapters (Postgres, SQLite) implement these. Status changes go through
//! `apply_transition`, which must enforce the monotonic rule inside the
//! store itself so concurrent writers can never move a payment backwards.

use chrono::{DateTime, Utc};

use crate::domain::{CryptoPayment, StatusUpdate};
use crate::error::RepoError;
use exchange_rates::Currency;

#[async_trait::async_trait]
pub trait PaymentRepository: Send + Sync + 'static {
    // ─────────────────────────────────────────────────────────────────────────────
    // Payment records
    // ─────────────────────────────────────────────────────────────────────────────

    /// Inserts a freshly opened payment.
    ///
    /// Returns `RepoError::Conflict` if the gateway payment id already exists.
    async fn insert_payment(&self, payment: &CryptoPayment) -> Result<(), RepoError>;

    /// Gets a payment by its gateway id.
    async fn get_payment(&self, payment_id: &str) -> Result<Option<CryptoPayment>, RepoError>;

    /// Lists every payment attempt for an order, oldest first.
    async fn list_payments_for_order(
        &self,
        order_id: &str,
    ) -> Result<Vec<CryptoPayment>, RepoError>;

    /// The order's non-terminal payment whose window is still open at `now`.
    async fn find_active_payment(
        &self,
        order_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<CryptoPayment>, RepoError>;

    // ─────────────────────────────────────────────────────────────────────────────
    // Status transitions (MUST be conditional)
    // ─────────────────────────────────────────────────────────────────────────────

    /// Applies `update` if its rank is strictly greater than the stored one,
    /// or it is the `REFUNDED` override and the row is not refunded yet.
    ///
    /// Returns the updated row, or `None` when the update was stale. The
    /// transaction hash is only written when none is stored.
    async fn apply_transition(
        &self,
        payment_id: &str,
        update: &StatusUpdate,
        now: DateTime<Utc>,
    ) -> Result<Option<CryptoPayment>, RepoError>;

    /// `NEW` and `CONFIRMING` payments whose window closed at or before `now`.
    async fn list_expired_candidates(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<CryptoPayment>, RepoError>;
}

#[async_trait::async_trait]
pub trait CurrencyRepository: Send + Sync + 'static {
    async fn list_currencies(&self) -> Result<Vec<Currency>, RepoError>;

    /// Writes the whole table in one transaction.
    ///
    /// Every row in `currencies` is upserted by code; exactly one of them is
    /// the base.
    async fn save_currencies(&self, currencies: &[Currency]) -> Result<(), RepoError>;
}
