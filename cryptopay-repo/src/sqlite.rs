//! SQLite repository adapter.
#![allow(clippy::collapsible_if)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;

use cryptopay_types::{
    CryptoPayment, Currency, CurrencyRepository, PaymentRepository, PaymentStatus, RepoError,
    StatusUpdate,
};

use crate::types::{
    CURRENCY_COLUMNS, PAYMENT_COLUMNS, SqliteCurrencyRow, SqlitePaymentRow, map_insert_error,
    sqlite_timestamp,
};

const MIGRATIONS: [(&str, &str); 2] = [
    (
        "0001",
        include_str!("../migrations/0001_create_crypto_payments.sql"),
    ),
    ("0002", include_str!("../migrations/0002_create_currencies.sql")),
];

// ─────────────────────────────────────────────────────────────────────────────
// SQLite Repository
// ─────────────────────────────────────────────────────────────────────────────

/// SQLite repository implementation.
pub struct SqliteRepo {
    pool: SqlitePool,
}

/// Executes SQL statements from a migration file, splitting by semicolons.
async fn run_migrations(pool: &SqlitePool) -> Result<(), anyhow::Error> {
    for (name, sql) in MIGRATIONS {
        for statement in sql.split(';') {
            let stmt = statement.trim();
            if !stmt.is_empty() {
                sqlx::query(stmt)
                    .execute(pool)
                    .await
                    .map_err(|e| anyhow::anyhow!("Migration {} failed: {}", name, e))?;
            }
        }
    }
    Ok(())
}

impl SqliteRepo {
    /// Creates a new SQLite repository with automatic migration.
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let in_memory = database_url.contains(":memory:") || database_url.contains("mode=memory");

        // Ensure on-disk SQLite target directory exists.
        if !in_memory {
            if let Some(path) = database_url.strip_prefix("sqlite://") {
                let path = path.split('?').next().unwrap_or(path);
                if let Some(parent) = std::path::Path::new(path).parent() {
                    if !parent.as_os_str().is_empty() {
                        tokio::fs::create_dir_all(parent).await?;
                    }
                }
            }
        }

        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

        // Every connection to `:memory:` is a separate database.
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new()
        };
        let pool = pool_options.connect_with(options).await?;

        run_migrations(&pool).await?;
        tracing::debug!(in_memory, "sqlite repository ready");

        Ok(Self { pool })
    }

    async fn fetch_payments(
        &self,
        sql: &str,
        binds: &[String],
        limit: Option<i64>,
    ) -> Result<Vec<CryptoPayment>, RepoError> {
        let mut query = sqlx::query_as::<_, SqlitePaymentRow>(sql);
        for value in binds {
            query = query.bind(value);
        }
        if let Some(limit) = limit {
            query = query.bind(limit);
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepoError::Database(e.to_string()))?;

        rows.into_iter().map(SqlitePaymentRow::into_domain).collect()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Payment records
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl PaymentRepository for SqliteRepo {
    async fn insert_payment(&self, payment: &CryptoPayment) -> Result<(), RepoError> {
        sqlx::query(
            r#"INSERT INTO crypto_payments
               (id, order_id, payment_id, currency, network, price_amount, price_currency, amount,
                address, status, status_rank, transaction_hash, expires_at, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(payment.id.to_string())
        .bind(&payment.order_id)
        .bind(&payment.payment_id)
        .bind(&payment.currency)
        .bind(&payment.network)
        .bind(payment.price_amount)
        .bind(&payment.price_currency)
        .bind(payment.amount)
        .bind(&payment.address)
        .bind(payment.status.as_str())
        .bind(payment.status.rank())
        .bind(&payment.transaction_hash)
        .bind(sqlite_timestamp(payment.expires_at))
        .bind(sqlite_timestamp(payment.created_at))
        .bind(sqlite_timestamp(payment.updated_at))
        .execute(&self.pool)
        .await
        .map_err(map_insert_error)?;

        Ok(())
    }

    async fn get_payment(&self, payment_id: &str) -> Result<Option<CryptoPayment>, RepoError> {
        let sql = format!(
            "SELECT {} FROM crypto_payments WHERE payment_id = ?",
            PAYMENT_COLUMNS
        );
        let row: Option<SqlitePaymentRow> = sqlx::query_as(&sql)
            .bind(payment_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepoError::Database(e.to_string()))?;

        row.map(SqlitePaymentRow::into_domain).transpose()
    }

    async fn list_payments_for_order(
        &self,
        order_id: &str,
    ) -> Result<Vec<CryptoPayment>, RepoError> {
        let sql = format!(
            "SELECT {} FROM crypto_payments WHERE order_id = ? ORDER BY created_at ASC",
            PAYMENT_COLUMNS
        );
        self.fetch_payments(&sql, &[order_id.to_string()], None)
            .await
    }

    async fn find_active_payment(
        &self,
        order_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<CryptoPayment>, RepoError> {
        let sql = format!(
            "SELECT {} FROM crypto_payments
             WHERE order_id = ? AND status IN ('NEW', 'CONFIRMING', 'CONFIRMED') AND expires_at > ?
             ORDER BY created_at DESC LIMIT 1",
            PAYMENT_COLUMNS
        );
        let mut found = self
            .fetch_payments(&sql, &[order_id.to_string(), sqlite_timestamp(now)], None)
            .await?;
        Ok(found.pop())
    }

    async fn apply_transition(
        &self,
        payment_id: &str,
        update: &StatusUpdate,
        now: DateTime<Utc>,
    ) -> Result<Option<CryptoPayment>, RepoError> {
        let sql = format!(
            "UPDATE crypto_payments
             SET status = ?, status_rank = ?,
                 transaction_hash = COALESCE(transaction_hash, ?), updated_at = ?
             WHERE payment_id = ? AND (status_rank < ? OR (? AND status <> 'REFUNDED'))
             RETURNING {}",
            PAYMENT_COLUMNS
        );
        let row: Option<SqlitePaymentRow> = sqlx::query_as(&sql)
            .bind(update.status.as_str())
            .bind(update.status.rank())
            .bind(&update.transaction_hash)
            .bind(sqlite_timestamp(now))
            .bind(payment_id)
            .bind(update.status.rank())
            .bind(update.status.is_override())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepoError::Database(e.to_string()))?;

        row.map(SqlitePaymentRow::into_domain).transpose()
    }

    async fn list_expired_candidates(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<CryptoPayment>, RepoError> {
        let sql = format!(
            "SELECT {} FROM crypto_payments
             WHERE status IN (?, ?) AND expires_at <= ?
             ORDER BY expires_at ASC LIMIT ?",
            PAYMENT_COLUMNS
        );
        self.fetch_payments(
            &sql,
            &[
                PaymentStatus::New.as_str().to_string(),
                PaymentStatus::Confirming.as_str().to_string(),
                sqlite_timestamp(now),
            ],
            Some(limit),
        )
        .await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Currencies
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl CurrencyRepository for SqliteRepo {
    async fn list_currencies(&self) -> Result<Vec<Currency>, RepoError> {
        let sql = format!("SELECT {} FROM currencies ORDER BY code", CURRENCY_COLUMNS);
        let rows: Vec<SqliteCurrencyRow> = sqlx::query_as(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepoError::Database(e.to_string()))?;

        rows.into_iter().map(SqliteCurrencyRow::into_domain).collect()
    }

    async fn save_currencies(&self, currencies: &[Currency]) -> Result<(), RepoError> {
        let mut db_tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepoError::Transaction(e.to_string()))?;

        // Clear the old base first so the single-base index holds at every step.
        sqlx::query("UPDATE currencies SET is_base = 0 WHERE is_base = 1")
            .execute(&mut *db_tx)
            .await
            .map_err(|e| RepoError::Database(e.to_string()))?;

        for currency in currencies {
            sqlx::query(
                r#"INSERT INTO currencies (code, name, symbol, is_active, is_base, exchange_rate, last_updated)
                   VALUES (?, ?, ?, ?, ?, ?, ?)
                   ON CONFLICT (code) DO UPDATE SET
                       name = excluded.name,
                       symbol = excluded.symbol,
                       is_active = excluded.is_active,
                       is_base = excluded.is_base,
                       exchange_rate = excluded.exchange_rate,
                       last_updated = excluded.last_updated"#,
            )
            .bind(&currency.code)
            .bind(&currency.name)
            .bind(&currency.symbol)
            .bind(currency.is_active)
            .bind(currency.is_base)
            .bind(currency.exchange_rate)
            .bind(sqlite_timestamp(currency.last_updated))
            .execute(&mut *db_tx)
            .await
            .map_err(|e| RepoError::Database(e.to_string()))?;
        }

        db_tx
            .commit()
            .await
            .map_err(|e| RepoError::Transaction(e.to_string()))?;

        Ok(())
    }
}
