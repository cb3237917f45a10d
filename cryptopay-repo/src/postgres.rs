//! PostgreSQL repository adapter.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use cryptopay_types::{
    CryptoPayment, Currency, CurrencyRepository, PaymentRepository, PaymentStatus, RepoError,
    StatusUpdate,
};

use crate::types::{CURRENCY_COLUMNS, PAYMENT_COLUMNS, PgCurrencyRow, PgPaymentRow, map_insert_error};

// ─────────────────────────────────────────────────────────────────────────────
// PostgreSQL Repository
// ─────────────────────────────────────────────────────────────────────────────

/// PostgreSQL repository. Status transitions are single conditional
/// updates, so concurrent writers from any process stay monotonic.
pub struct PostgresRepo {
    pool: PgPool,
}

/// Executes SQL statements from a migration file, splitting by semicolons.
async fn execute_migration(pool: &PgPool, sql: &str, name: &str) -> Result<(), anyhow::Error> {
    for statement in sql.split(';') {
        let stmt = statement.trim();
        if !stmt.is_empty() {
            sqlx::query(stmt)
                .execute(pool)
                .await
                .map_err(|e| anyhow::anyhow!("Migration {} failed: {}", name, e))?;
        }
    }
    Ok(())
}

/// Runs all database migrations.
async fn run_migrations(pool: &PgPool) -> Result<(), anyhow::Error> {
    execute_migration(
        pool,
        include_str!("../migrations/0001_create_crypto_payments_pg.sql"),
        "0001",
    )
    .await?;

    execute_migration(
        pool,
        include_str!("../migrations/0002_create_currencies_pg.sql"),
        "0002",
    )
    .await?;

    Ok(())
}

impl PostgresRepo {
    /// Creates a new PostgreSQL repository with automatic migration.
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        run_migrations(&pool).await?;
        tracing::debug!("postgres repository ready");
        Ok(Self { pool })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Payment records
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl PaymentRepository for PostgresRepo {
    async fn insert_payment(&self, payment: &CryptoPayment) -> Result<(), RepoError> {
        sqlx::query(
            r#"INSERT INTO crypto_payments
               (id, order_id, payment_id, currency, network, price_amount, price_currency, amount,
                address, status, status_rank, transaction_hash, expires_at, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)"#,
        )
        .bind(payment.id)
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
        .bind(payment.expires_at)
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_insert_error)?;

        Ok(())
    }

    async fn get_payment(&self, payment_id: &str) -> Result<Option<CryptoPayment>, RepoError> {
        let sql = format!(
            "SELECT {} FROM crypto_payments WHERE payment_id = $1",
            PAYMENT_COLUMNS
        );
        let row: Option<PgPaymentRow> = sqlx::query_as(&sql)
            .bind(payment_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepoError::Database(e.to_string()))?;

        row.map(PgPaymentRow::into_domain).transpose()
    }

    async fn list_payments_for_order(
        &self,
        order_id: &str,
    ) -> Result<Vec<CryptoPayment>, RepoError> {
        let sql = format!(
            "SELECT {} FROM crypto_payments WHERE order_id = $1 ORDER BY created_at ASC",
            PAYMENT_COLUMNS
        );
        let rows: Vec<PgPaymentRow> = sqlx::query_as(&sql)
            .bind(order_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepoError::Database(e.to_string()))?;

        rows.into_iter().map(PgPaymentRow::into_domain).collect()
    }

    async fn find_active_payment(
        &self,
        order_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<CryptoPayment>, RepoError> {
        let sql = format!(
            "SELECT {} FROM crypto_payments
             WHERE order_id = $1 AND status IN ('NEW', 'CONFIRMING', 'CONFIRMED') AND expires_at > $2
             ORDER BY created_at DESC LIMIT 1",
            PAYMENT_COLUMNS
        );
        let row: Option<PgPaymentRow> = sqlx::query_as(&sql)
            .bind(order_id)
            .bind(now)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepoError::Database(e.to_string()))?;

        row.map(PgPaymentRow::into_domain).transpose()
    }

    async fn apply_transition(
        &self,
        payment_id: &str,
        update: &StatusUpdate,
        now: DateTime<Utc>,
    ) -> Result<Option<CryptoPayment>, RepoError> {
        let sql = format!(
            "UPDATE crypto_payments
             SET status = $1, status_rank = $2,
                 transaction_hash = COALESCE(transaction_hash, $3), updated_at = $4
             WHERE payment_id = $5 AND (status_rank < $2 OR ($6 AND status <> 'REFUNDED'))
             RETURNING {}",
            PAYMENT_COLUMNS
        );
        let row: Option<PgPaymentRow> = sqlx::query_as(&sql)
            .bind(update.status.as_str())
            .bind(update.status.rank())
            .bind(&update.transaction_hash)
            .bind(now)
            .bind(payment_id)
            .bind(update.status.is_override())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepoError::Database(e.to_string()))?;

        row.map(PgPaymentRow::into_domain).transpose()
    }

    async fn list_expired_candidates(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<CryptoPayment>, RepoError> {
        let sql = format!(
            "SELECT {} FROM crypto_payments
             WHERE status IN ($1, $2) AND expires_at <= $3
             ORDER BY expires_at ASC LIMIT $4",
            PAYMENT_COLUMNS
        );
        let rows: Vec<PgPaymentRow> = sqlx::query_as(&sql)
            .bind(PaymentStatus::New.as_str())
            .bind(PaymentStatus::Confirming.as_str())
            .bind(now)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepoError::Database(e.to_string()))?;

        rows.into_iter().map(PgPaymentRow::into_domain).collect()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Currencies
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl CurrencyRepository for PostgresRepo {
    async fn list_currencies(&self) -> Result<Vec<Currency>, RepoError> {
        let sql = format!("SELECT {} FROM currencies ORDER BY code", CURRENCY_COLUMNS);
        let rows: Vec<PgCurrencyRow> = sqlx::query_as(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepoError::Database(e.to_string()))?;

        Ok(rows.into_iter().map(Currency::from).collect())
    }

    async fn save_currencies(&self, currencies: &[Currency]) -> Result<(), RepoError> {
        let mut db_tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepoError::Transaction(e.to_string()))?;

        // Serialize table writers across processes.
        sqlx::query("LOCK TABLE currencies IN SHARE ROW EXCLUSIVE MODE")
            .execute(&mut *db_tx)
            .await
            .map_err(|e| RepoError::Database(e.to_string()))?;

        sqlx::query("UPDATE currencies SET is_base = FALSE WHERE is_base")
            .execute(&mut *db_tx)
            .await
            .map_err(|e| RepoError::Database(e.to_string()))?;

        for currency in currencies {
            sqlx::query(
                r#"INSERT INTO currencies (code, name, symbol, is_active, is_base, exchange_rate, last_updated)
                   VALUES ($1, $2, $3, $4, $5, $6, $7)
                   ON CONFLICT (code) DO UPDATE SET
                       name = EXCLUDED.name,
                       symbol = EXCLUDED.symbol,
                       is_active = EXCLUDED.is_active,
                       is_base = EXCLUDED.is_base,
                       exchange_rate = EXCLUDED.exchange_rate,
                       last_updated = EXCLUDED.last_updated"#,
            )
            .bind(&currency.code)
            .bind(&currency.name)
            .bind(&currency.symbol)
            .bind(currency.is_active)
            .bind(currency.is_base)
            .bind(currency.exchange_rate)
            .bind(currency.last_updated)
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
