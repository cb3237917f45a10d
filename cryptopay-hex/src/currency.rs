//! Currency Conversion Service
//!
//! Owns the in-memory rate table. Readers take an `Arc` snapshot and never
//! block on writers; writers are serialized, build a new table, persist it in
//! one transaction and only then swap it in.

use std::sync::{Arc, RwLock};

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use cryptopay_types::{
    AddCurrencyRequest, AppError, ConvertResponse, Currency, CurrencyRepository,
    ExchangeRateProvider, RateError, RateResponse, RateTable, RefreshReport,
};
use exchange_rates::{default_currencies, normalize_code};

pub struct CurrencyService {
    repo: Arc<dyn CurrencyRepository>,
    provider: Arc<dyn ExchangeRateProvider>,
    table: RwLock<Arc<RateTable>>,
    write_lock: Mutex<()>,
}

impl CurrencyService {
    /// Loads the table from the store, seeding the default currencies when
    /// the store is empty.
    pub async fn load(
        repo: Arc<dyn CurrencyRepository>,
        provider: Arc<dyn ExchangeRateProvider>,
    ) -> Result<Self, AppError> {
        let table = load_table(repo.as_ref()).await?;
        info!(
            base = table.base_code(),
            currencies = table.len(),
            "rate table loaded"
        );

        Ok(Self {
            repo,
            provider,
            table: RwLock::new(Arc::new(table)),
            write_lock: Mutex::new(()),
        })
    }

    /// Current table. Cheap; holds no lock after returning.
    pub fn snapshot(&self) -> Arc<RateTable> {
        self.table
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn publish(&self, next: RateTable) -> Arc<RateTable> {
        let next = Arc::new(next);
        *self
            .table
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = next.clone();
        next
    }

    /// Persists `next` as the whole table, then makes it visible.
    async fn commit(&self, next: RateTable) -> Result<Arc<RateTable>, AppError> {
        self.repo.save_currencies(&next.to_vec()).await?;
        Ok(self.publish(next))
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────────────

    pub fn list_currencies(&self) -> Vec<Currency> {
        self.snapshot().to_vec()
    }

    pub fn get_rate(&self, code: &str) -> Result<RateResponse, AppError> {
        let table = self.snapshot();
        Ok(RateResponse {
            code: normalize_code(code),
            base: table.base_code().to_string(),
            rate: table.rate(code)?,
        })
    }

    pub fn convert(&self, from: &str, to: &str, amount: f64) -> Result<ConvertResponse, AppError> {
        let result = self.snapshot().convert(from, to, amount)?;
        Ok(ConvertResponse {
            from: normalize_code(from),
            to: normalize_code(to),
            amount,
            result,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Writes
    // ─────────────────────────────────────────────────────────────────────────────

    /// Pulls a snapshot keyed by the current base and replaces all non-base
    /// rates. Upstream failures leave the table untouched.
    #[instrument(skip(self))]
    pub async fn refresh_rates(&self) -> Result<RefreshReport, AppError> {
        let _writer = self.write_lock.lock().await;
        let current = self.snapshot();
        let base = current.base_code().to_string();

        let snapshot = self.provider.fetch_rates(&base).await.map_err(|e| {
            warn!(error = %e, "rate refresh failed");
            AppError::from(e)
        })?;
        if normalize_code(&snapshot.base) != base {
            return Err(AppError::Upstream(format!(
                "rate provider unavailable: snapshot keyed by {}, expected {}",
                snapshot.base, base
            )));
        }

        let (next, report) = current.apply_snapshot(&snapshot.rates, Utc::now());
        self.commit(next).await?;

        if report.is_complete() {
            info!(updated = report.updated.len(), "rates refreshed");
        } else {
            warn!(
                updated = report.updated.len(),
                missing = ?report.missing,
                invalid = ?report.invalid,
                "rates refreshed with gaps; previous rates kept"
            );
        }
        Ok(report)
    }

    /// Makes `code` the base and re-expresses every rate against it.
    #[instrument(skip(self))]
    pub async fn set_base_currency(&self, code: &str) -> Result<Currency, AppError> {
        let _writer = self.write_lock.lock().await;
        let next = self.snapshot().rebase(code, Utc::now())?;
        let table = self.commit(next).await?;
        info!(base = table.base_code(), "base currency changed");
        Ok(table.base().clone())
    }

    #[instrument(skip(self, req), fields(code = %req.code))]
    pub async fn add_currency(&self, req: AddCurrencyRequest) -> Result<Currency, AppError> {
        let code = normalize_code(&req.code);
        if code.is_empty() {
            return Err(AppError::InvalidArgument("Currency code cannot be empty".into()));
        }

        let _writer = self.write_lock.lock().await;
        let currency = Currency::new(&code, req.name, req.symbol, req.exchange_rate, Utc::now());
        let next = self.snapshot().with_currency(currency)?;
        let table = self.commit(next).await?;
        lookup(&table, &code)
    }

    /// Activates or deactivates a currency. The base cannot be deactivated.
    #[instrument(skip(self))]
    pub async fn set_active(&self, code: &str, active: bool) -> Result<Currency, AppError> {
        let _writer = self.write_lock.lock().await;
        let next = self.snapshot().with_active(code, active, Utc::now())?;
        let table = self.commit(next).await?;
        lookup(&table, code)
    }

    /// Discards the cached table and reloads it from the store.
    #[instrument(skip(self))]
    pub async fn reload(&self) -> Result<Vec<Currency>, AppError> {
        let _writer = self.write_lock.lock().await;
        let table = load_table(self.repo.as_ref()).await?;
        Ok(self.publish(table).to_vec())
    }
}

fn lookup(table: &RateTable, code: &str) -> Result<Currency, AppError> {
    table
        .get(code)
        .cloned()
        .ok_or_else(|| AppError::from(RateError::UnknownCurrency(normalize_code(code))))
}

async fn load_table(repo: &dyn CurrencyRepository) -> Result<RateTable, AppError> {
    let mut currencies = repo.list_currencies().await?;
    if currencies.is_empty() {
        currencies = default_currencies(Utc::now());
        repo.save_currencies(&currencies).await?;
        info!("seeded default currencies");
    }

    // A stored table that breaks the single-base rule is a server fault.
    RateTable::from_currencies(currencies)
        .map_err(|e| AppError::Internal(format!("stored rate table is invalid: {}", e)))
}
