//! Database row types for SQLite and PostgreSQL.
//!
//! SQLite stores identifiers and timestamps as TEXT, so each backend gets its
//! own row struct; both convert into the same domain types.

use std::str::FromStr;

use sqlx::FromRow;

use cryptopay_types::{CryptoPayment, Currency, PaymentStatus, RepoError};

#[cfg(feature = "sqlite")]
use chrono::{DateTime, SecondsFormat, Utc};

/// Columns selected for every payment query, in row-struct order.
pub const PAYMENT_COLUMNS: &str = "id, order_id, payment_id, currency, network, price_amount, \
     price_currency, amount, address, status, transaction_hash, expires_at, created_at, updated_at";

pub const CURRENCY_COLUMNS: &str =
    "code, name, symbol, is_active, is_base, exchange_rate, last_updated";

fn parse_status(status: &str) -> Result<PaymentStatus, RepoError> {
    Ok(PaymentStatus::from_str(status)?)
}

// ─────────────────────────────────────────────────────────────────────────────
// SQLite rows
// ─────────────────────────────────────────────────────────────────────────────

/// Fixed-width RFC 3339 so TEXT comparison orders like time.
#[cfg(feature = "sqlite")]
pub fn sqlite_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[cfg(feature = "sqlite")]
fn parse_sqlite_timestamp(value: &str) -> Result<DateTime<Utc>, RepoError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepoError::Database(format!("invalid timestamp {:?}: {}", value, e)))
}

#[cfg(feature = "sqlite")]
#[derive(FromRow)]
pub struct SqlitePaymentRow {
    pub id: String,
    pub order_id: String,
    pub payment_id: String,
    pub currency: String,
    pub network: String,
    pub price_amount: f64,
    pub price_currency: String,
    pub amount: f64,
    pub address: String,
    pub status: String,
    pub transaction_hash: Option<String>,
    pub expires_at: String,
    pub created_at: String,
    pub updated_at: String,
}

#[cfg(feature = "sqlite")]
impl SqlitePaymentRow {
    pub fn into_domain(self) -> Result<CryptoPayment, RepoError> {
        let id = uuid::Uuid::parse_str(&self.id)
            .map_err(|e| RepoError::Database(format!("invalid payment id: {}", e)))?;

        Ok(CryptoPayment {
            id,
            order_id: self.order_id,
            payment_id: self.payment_id,
            currency: self.currency,
            network: self.network,
            price_amount: self.price_amount,
            price_currency: self.price_currency,
            amount: self.amount,
            address: self.address,
            status: parse_status(&self.status)?,
            transaction_hash: self.transaction_hash,
            expires_at: parse_sqlite_timestamp(&self.expires_at)?,
            created_at: parse_sqlite_timestamp(&self.created_at)?,
            updated_at: parse_sqlite_timestamp(&self.updated_at)?,
        })
    }
}

#[cfg(feature = "sqlite")]
#[derive(FromRow)]
pub struct SqliteCurrencyRow {
    pub code: String,
    pub name: String,
    pub symbol: String,
    pub is_active: bool,
    pub is_base: bool,
    pub exchange_rate: f64,
    pub last_updated: String,
}

#[cfg(feature = "sqlite")]
impl SqliteCurrencyRow {
    pub fn into_domain(self) -> Result<Currency, RepoError> {
        Ok(Currency {
            code: self.code,
            name: self.name,
            symbol: self.symbol,
            is_active: self.is_active,
            is_base: self.is_base,
            exchange_rate: self.exchange_rate,
            last_updated: parse_sqlite_timestamp(&self.last_updated)?,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// PostgreSQL rows
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(feature = "postgres")]
#[derive(FromRow)]
pub struct PgPaymentRow {
    pub id: uuid::Uuid,
    pub order_id: String,
    pub payment_id: String,
    pub currency: String,
    pub network: String,
    pub price_amount: f64,
    pub price_currency: String,
    pub amount: f64,
    pub address: String,
    pub status: String,
    pub transaction_hash: Option<String>,
    pub expires_at: chrono::DateTime<chrono::Utc>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[cfg(feature = "postgres")]
impl PgPaymentRow {
    pub fn into_domain(self) -> Result<CryptoPayment, RepoError> {
        Ok(CryptoPayment {
            id: self.id,
            order_id: self.order_id,
            payment_id: self.payment_id,
            currency: self.currency,
            network: self.network,
            price_amount: self.price_amount,
            price_currency: self.price_currency,
            amount: self.amount,
            address: self.address,
            status: parse_status(&self.status)?,
            transaction_hash: self.transaction_hash,
            expires_at: self.expires_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[cfg(feature = "postgres")]
#[derive(FromRow)]
pub struct PgCurrencyRow {
    pub code: String,
    pub name: String,
    pub symbol: String,
    pub is_active: bool,
    pub is_base: bool,
    pub exchange_rate: f64,
    pub last_updated: chrono::DateTime<chrono::Utc>,
}

#[cfg(feature = "postgres")]
impl From<PgCurrencyRow> for Currency {
    fn from(row: PgCurrencyRow) -> Self {
        Currency {
            code: row.code,
            name: row.name,
            symbol: row.symbol,
            is_active: row.is_active,
            is_base: row.is_base,
            exchange_rate: row.exchange_rate,
            last_updated: row.last_updated,
        }
    }
}

/// Maps a sqlx error, turning unique violations into `Conflict`.
pub fn map_insert_error(err: sqlx::Error) -> RepoError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            RepoError::Conflict(db.message().to_string())
        }
        _ => RepoError::Database(err.to_string()),
    }
}
