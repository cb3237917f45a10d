//! Background jobs: the expiry sweep and the periodic rate refresh.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{error, info, instrument};

use cryptopay_types::PaymentRepository;

use crate::PaymentService;
use crate::currency::CurrencyService;

/// Expires payments whose window has closed.
pub struct ExpirySweeper<R: PaymentRepository> {
    service: Arc<PaymentService<R>>,
    interval: Duration,
}

impl<R: PaymentRepository> ExpirySweeper<R> {
    pub fn new(service: Arc<PaymentService<R>>, interval: Duration) -> Self {
        Self { service, interval }
    }

    /// Runs one sweep, logging instead of failing.
    pub async fn tick(&self) -> usize {
        match self.service.expire_stale().await {
            Ok(expired) => expired,
            Err(e) => {
                error!("Expiry sweep failed: {}", e);
                0
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn run(self) {
        info!("Starting expiry sweeper every {:?}", self.interval);
        loop {
            self.tick().await;
            sleep(self.interval).await;
        }
    }
}

/// Pulls fresh rates from the rate API.
pub struct RateRefreshWorker {
    currencies: Arc<CurrencyService>,
    interval: Duration,
}

impl RateRefreshWorker {
    pub fn new(currencies: Arc<CurrencyService>, interval: Duration) -> Self {
        Self {
            currencies,
            interval,
        }
    }

    /// Runs one refresh. Returns whether the table was replaced.
    pub async fn tick(&self) -> bool {
        match self.currencies.refresh_rates().await {
            Ok(_) => true,
            Err(e) => {
                error!("Rate refresh failed: {}", e);
                false
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn run(self) {
        info!("Starting rate refresh every {:?}", self.interval);
        loop {
            // The table was loaded at startup; wait a full interval first.
            sleep(self.interval).await;
            self.tick().await;
        }
    }
}
