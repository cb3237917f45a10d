//! Payment Lifecycle Service
//!
//! Orchestrates payment creation, status reconciliation and webhook
//! ingestion through the ports. Owns the status state machine; contains no
//! infrastructure logic.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, instrument, warn};

use cryptopay_types::{
    ActivePaymentResponse, AppError, CreateCryptoPaymentRequest, CryptoPayment, EstimateResponse,
    GatewayError, OpenPayment, OrderFulfillment, PaymentGateway, PaymentRepository,
    PaymentResponse, PaymentStatus, RepoError, StatusUpdate, WebhookAck, WebhookEvent,
    ports::GatewayPaymentRequest,
};
use exchange_rates::normalize_code;

use crate::currency::CurrencyService;
use crate::locks::KeyedLocks;
use crate::verifier::WebhookVerifier;

/// Expiry sweep batch size.
const SWEEP_BATCH: i64 = 100;

/// Deployment settings the payment flow needs.
#[derive(Debug, Clone)]
pub struct PaymentSettings {
    /// Fiat currency prices are quoted to the gateway in (e.g. `usd`)
    pub price_currency: String,
    /// Absolute URL the gateway posts notifications to
    pub callback_url: String,
    /// Hosted payment page prefix; the payment id is appended
    pub payment_page_url: String,
}

/// Where a status report came from. Only used for logging.
#[derive(Debug, Clone, Copy)]
enum Source {
    Webhook,
    Poll,
    Sweep,
    Admin,
}

/// Application service for the crypto payment lifecycle.
///
/// Generic over `R: PaymentRepository`; the gateway, fulfillment hook and
/// currency service are injected as trait objects.
pub struct PaymentService<R: PaymentRepository> {
    repo: Arc<R>,
    gateway: Arc<dyn PaymentGateway>,
    fulfillment: Arc<dyn OrderFulfillment>,
    currencies: Arc<CurrencyService>,
    verifier: WebhookVerifier,
    settings: PaymentSettings,
    payment_locks: KeyedLocks,
    order_locks: KeyedLocks,
}

impl<R: PaymentRepository> PaymentService<R> {
    pub fn new(
        repo: Arc<R>,
        gateway: Arc<dyn PaymentGateway>,
        fulfillment: Arc<dyn OrderFulfillment>,
        currencies: Arc<CurrencyService>,
        verifier: WebhookVerifier,
        settings: PaymentSettings,
    ) -> Self {
        Self {
            repo,
            gateway,
            fulfillment,
            currencies,
            verifier,
            settings,
            payment_locks: KeyedLocks::new(),
            order_locks: KeyedLocks::new(),
        }
    }

    /// Returns a reference to the underlying repository.
    pub fn repo(&self) -> &R {
        &self.repo
    }

    pub fn currencies(&self) -> &CurrencyService {
        &self.currencies
    }

    fn view(&self, payment: &CryptoPayment) -> PaymentResponse {
        PaymentResponse::from_payment(payment, &self.settings.payment_page_url)
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Quotes and creation
    // ─────────────────────────────────────────────────────────────────────────────

    /// Asks the gateway how much crypto a fiat amount buys. No local fallback.
    #[instrument(skip(self))]
    pub async fn estimate(
        &self,
        amount: f64,
        from_currency: &str,
        to_currency: &str,
    ) -> Result<EstimateResponse, AppError> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(AppError::InvalidArgument("Amount must be positive".into()));
        }

        let quote = self
            .gateway
            .estimate(
                amount,
                &from_currency.trim().to_lowercase(),
                &to_currency.trim().to_lowercase(),
            )
            .await
            .map_err(|e| upstream("estimate", e))?;

        Ok(EstimateResponse {
            estimated_amount: quote.estimated_amount,
            currency: quote.currency_to,
        })
    }

    /// Opens a gateway payment for an order that has no active one.
    #[instrument(skip(self, req), fields(order_id = %req.order_id, currency = %req.currency))]
    pub async fn create_payment(
        &self,
        req: CreateCryptoPaymentRequest,
    ) -> Result<PaymentResponse, AppError> {
        let order_id = req.order_id.trim().to_string();
        if order_id.is_empty() {
            return Err(AppError::InvalidArgument("order_id cannot be empty".into()));
        }
        if req.currency.trim().is_empty() || req.network.trim().is_empty() {
            return Err(AppError::InvalidArgument(
                "currency and network are required".into(),
            ));
        }
        if !req.amount.is_finite() || req.amount <= 0.0 {
            return Err(AppError::InvalidArgument("Amount must be positive".into()));
        }

        let _order = self.order_locks.lock(&order_id).await;
        let now = Utc::now();

        if let Some(active) = self.repo.find_active_payment(&order_id, now).await? {
            info!(payment_id = %active.payment_id, "order already has an active payment");
            return Err(AppError::Conflict("payment already in progress".into()));
        }

        let price_currency = normalize_code(&self.settings.price_currency);
        let price_amount = match req.price_currency.as_deref().map(normalize_code) {
            Some(from) if from != price_currency => {
                let converted = self
                    .currencies
                    .convert(&from, &price_currency, req.amount)?
                    .result;
                debug!(from = %from, amount = req.amount, converted, "price converted");
                converted
            }
            _ => req.amount,
        };
        if price_amount <= 0.0 {
            return Err(AppError::InvalidArgument(
                "Amount is too small after conversion".into(),
            ));
        }

        let created = self
            .gateway
            .create_payment(&GatewayPaymentRequest {
                price_amount,
                price_currency: price_currency.to_lowercase(),
                pay_currency: req.currency.trim().to_lowercase(),
                network: req.network.trim().to_string(),
                order_id: order_id.clone(),
                order_description: req.description.clone(),
                ipn_callback_url: self.settings.callback_url.clone(),
            })
            .await
            .map_err(|e| upstream("create payment", e))?;

        let payment = CryptoPayment::open(
            OpenPayment {
                order_id,
                payment_id: created.payment_id,
                currency: req.currency.trim().to_string(),
                network: req.network.trim().to_string(),
                price_amount,
                price_currency,
                amount: created.pay_amount,
                address: created.pay_address,
            },
            now,
        )
        .map_err(|e| {
            error!(error = %e, "gateway returned an unusable payment");
            AppError::Upstream(format!("gateway unavailable: {}", e))
        })?;

        self.repo.insert_payment(&payment).await.map_err(|e| match e {
            RepoError::Conflict(_) => {
                AppError::Conflict(format!("payment {} already exists", payment.payment_id))
            }
            other => other.into(),
        })?;

        info!(payment_id = %payment.payment_id, amount = payment.amount, "payment created");
        Ok(self.view(&payment))
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Reconciliation
    // ─────────────────────────────────────────────────────────────────────────────

    /// Returns the payment, refreshed from the gateway when it answers.
    #[instrument(skip(self))]
    pub async fn get_status(&self, payment_id: &str) -> Result<PaymentResponse, AppError> {
        let stored = self.load(payment_id).await?;

        match self.gateway.get_payment_status(payment_id).await {
            Ok(live) => {
                let update = StatusUpdate::new(live.payment_status.into(), live.transaction_hash);
                let (payment, _) = self.apply_update(payment_id, update, Source::Poll).await?;
                Ok(self.view(&payment))
            }
            Err(e) => {
                warn!(error = %e, "gateway status unavailable; serving stored view");
                Ok(self.view(&stored))
            }
        }
    }

    /// Verifies, parses and applies a gateway notification.
    #[instrument(skip(self, raw_body, signature), fields(payment_id = tracing::field::Empty))]
    pub async fn apply_webhook(
        &self,
        raw_body: &[u8],
        signature: Option<&str>,
    ) -> Result<WebhookAck, AppError> {
        self.verifier.verify(raw_body, signature).map_err(|e| {
            warn!(error = %e, "webhook rejected");
            AppError::Unauthorized(e.to_string())
        })?;

        let event = WebhookEvent::parse(raw_body)?;
        tracing::Span::current().record("payment_id", event.payment_id.as_str());

        let (payment, applied) = self
            .apply_update(&event.payment_id, event.status_update(), Source::Webhook)
            .await
            .inspect_err(|e| {
                if matches!(e, AppError::NotFound(_)) {
                    warn!("webhook for unknown payment dropped");
                }
            })?;

        Ok(WebhookAck {
            payment_id: payment.payment_id,
            status: payment.status,
            applied,
        })
    }

    /// Moves every `NEW`/`CONFIRMING` payment past its window to `EXPIRED`.
    /// Returns how many were expired.
    #[instrument(skip(self))]
    pub async fn expire_stale(&self) -> Result<usize, AppError> {
        let mut expired = 0;
        loop {
            let batch = self
                .repo
                .list_expired_candidates(Utc::now(), SWEEP_BATCH)
                .await?;
            let batch_len = batch.len();

            for candidate in batch {
                let update = StatusUpdate::new(PaymentStatus::Expired, None);
                let (_, applied) = self
                    .apply_update(&candidate.payment_id, update, Source::Sweep)
                    .await?;
                if applied {
                    expired += 1;
                }
            }

            if (batch_len as i64) < SWEEP_BATCH {
                break;
            }
        }

        if expired > 0 {
            info!(expired, "expired stale payments");
        }
        Ok(expired)
    }

    /// Administrative refund. Repeating it is a no-op.
    #[instrument(skip(self))]
    pub async fn refund(&self, payment_id: &str) -> Result<PaymentResponse, AppError> {
        let update = StatusUpdate::new(PaymentStatus::Refunded, None);
        let (payment, _) = self.apply_update(payment_id, update, Source::Admin).await?;
        Ok(self.view(&payment))
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────────

    pub async fn has_active_payment(&self, order_id: &str) -> Result<ActivePaymentResponse, AppError> {
        let active = self.repo.find_active_payment(order_id, Utc::now()).await?;
        Ok(ActivePaymentResponse {
            order_id: order_id.to_string(),
            has_active_payment: active.is_some(),
            payment: active.as_ref().map(|p| self.view(p)),
        })
    }

    pub async fn list_for_order(&self, order_id: &str) -> Result<Vec<PaymentResponse>, AppError> {
        let payments = self.repo.list_payments_for_order(order_id).await?;
        Ok(payments.iter().map(|p| self.view(p)).collect())
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // State machine
    // ─────────────────────────────────────────────────────────────────────────────

    async fn load(&self, payment_id: &str) -> Result<CryptoPayment, AppError> {
        self.repo
            .get_payment(payment_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Payment {}", payment_id)))
    }

    /// Applies `update` under the per-payment lock and the store's
    /// conditional write. Returns the current payment and whether it changed.
    async fn apply_update(
        &self,
        payment_id: &str,
        update: StatusUpdate,
        source: Source,
    ) -> Result<(CryptoPayment, bool), AppError> {
        let _payment = self.payment_locks.lock(payment_id).await;
        let current = self.load(payment_id).await?;

        if let Some(stored) = current.conflicting_hash(update.transaction_hash.as_deref()) {
            warn!(
                payment_id,
                stored_hash = stored,
                reported_hash = ?update.transaction_hash,
                ?source,
                "conflicting transaction hash reported; keeping the stored one"
            );
        }

        if !current.status.can_advance_to(update.status) {
            debug!(
                payment_id,
                current = %current.status,
                reported = %update.status,
                ?source,
                "stale status ignored"
            );
            return Ok((current, false));
        }

        let Some(updated) = self
            .repo
            .apply_transition(payment_id, &update, Utc::now())
            .await?
        else {
            // Another process advanced it first.
            let latest = self.load(payment_id).await?;
            return Ok((latest, false));
        };

        info!(
            payment_id,
            from = %current.status,
            to = %updated.status,
            ?source,
            "payment status changed"
        );

        if updated.status == PaymentStatus::Finished {
            self.notify_finished(&updated).await;
        }
        Ok((updated, true))
    }

    async fn notify_finished(&self, payment: &CryptoPayment) {
        if let Err(e) = self.fulfillment.payment_finished(payment).await {
            error!(
                payment_id = %payment.payment_id,
                order_id = %payment.order_id,
                error = %e,
                "order fulfillment failed"
            );
        }
    }
}

fn upstream(operation: &str, err: GatewayError) -> AppError {
    warn!(operation, error = %err, "gateway call failed");
    AppError::from(err)
}
