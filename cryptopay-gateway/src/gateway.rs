//! Crypto payment gateway client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use cryptopay_types::domain::id_from_string_or_number;
use cryptopay_types::{
    GatewayError, GatewayStatus, PaymentGateway,
    ports::{CreatedPayment, EstimateQuote, GatewayPaymentRequest, GatewayPaymentStatus},
};

use crate::http::{ClientError, build_http, f64_from_string_or_number, handle_response, trim_base_url};

/// Default per-request timeout for gateway calls.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

const API_KEY_HEADER: &str = "x-api-key";

impl From<ClientError> for GatewayError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Http(e) if e.is_decode() && !e.is_timeout() => {
                GatewayError::InvalidResponse(e.to_string())
            }
            ClientError::Http(e) => GatewayError::Unavailable(e.to_string()),
            ClientError::Api { status, message } => GatewayError::Rejected { status, message },
            ClientError::Json(e) => GatewayError::InvalidResponse(e.to_string()),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Wire format
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct EstimateBody {
    #[serde(deserialize_with = "f64_from_string_or_number")]
    amount_from: f64,
    currency_from: String,
    currency_to: String,
    #[serde(deserialize_with = "f64_from_string_or_number")]
    estimated_amount: f64,
}

#[derive(Debug, Serialize)]
struct CreatePaymentBody<'a> {
    price_amount: f64,
    price_currency: &'a str,
    pay_currency: &'a str,
    network: &'a str,
    order_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    order_description: Option<&'a str>,
    ipn_callback_url: &'a str,
}

#[derive(Debug, Deserialize)]
struct CreatedPaymentBody {
    #[serde(deserialize_with = "id_from_string_or_number")]
    payment_id: String,
    payment_status: GatewayStatus,
    pay_address: String,
    #[serde(deserialize_with = "f64_from_string_or_number")]
    pay_amount: f64,
    pay_currency: String,
    #[serde(default)]
    network: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PaymentStatusBody {
    #[serde(deserialize_with = "id_from_string_or_number")]
    payment_id: String,
    payment_status: GatewayStatus,
    #[serde(default, alias = "transaction_hash")]
    payin_hash: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Client
// ─────────────────────────────────────────────────────────────────────────────

/// Stateless gateway client. Every call carries the API key and is bounded
/// by the configured timeout.
pub struct GatewayClient {
    base_url: String,
    api_key: String,
    http: Client,
}

impl GatewayClient {
    /// Creates a new client.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        Ok(Self {
            base_url: trim_base_url(base_url),
            api_key: api_key.into(),
            http: build_http(timeout)?,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl PaymentGateway for GatewayClient {
    #[instrument(skip(self))]
    async fn estimate(
        &self,
        amount: f64,
        currency_from: &str,
        currency_to: &str,
    ) -> Result<EstimateQuote, GatewayError> {
        let amount = amount.to_string();
        let resp = self
            .http
            .get(self.url("/estimate"))
            .header(API_KEY_HEADER, &self.api_key)
            .query(&[
                ("amount", amount.as_str()),
                ("currency_from", currency_from),
                ("currency_to", currency_to),
            ])
            .send()
            .await
            .map_err(ClientError::from)?;

        let body: EstimateBody = handle_response(resp).await?;
        debug!(estimated_amount = body.estimated_amount, "gateway estimate");

        Ok(EstimateQuote {
            amount_from: body.amount_from,
            currency_from: body.currency_from,
            currency_to: body.currency_to,
            estimated_amount: body.estimated_amount,
        })
    }

    #[instrument(skip(self, req), fields(order_id = %req.order_id))]
    async fn create_payment(
        &self,
        req: &GatewayPaymentRequest,
    ) -> Result<CreatedPayment, GatewayError> {
        let body = CreatePaymentBody {
            price_amount: req.price_amount,
            price_currency: &req.price_currency,
            pay_currency: &req.pay_currency,
            network: &req.network,
            order_id: &req.order_id,
            order_description: req.order_description.as_deref(),
            ipn_callback_url: &req.ipn_callback_url,
        };

        let resp = self
            .http
            .post(self.url("/payment"))
            .header(API_KEY_HEADER, &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(ClientError::from)?;

        let created: CreatedPaymentBody = handle_response(resp).await.inspect_err(|e| {
            warn!(error = %e, "gateway create payment failed");
        })?;

        Ok(CreatedPayment {
            payment_id: created.payment_id,
            pay_address: created.pay_address,
            pay_amount: created.pay_amount,
            pay_currency: created.pay_currency,
            network: created.network,
            payment_status: created.payment_status,
        })
    }

    #[instrument(skip(self))]
    async fn get_payment_status(
        &self,
        payment_id: &str,
    ) -> Result<GatewayPaymentStatus, GatewayError> {
        let resp = self
            .http
            .get(self.url(&format!("/payment/{}", payment_id)))
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(ClientError::from)?;

        let body: PaymentStatusBody = handle_response(resp).await?;

        Ok(GatewayPaymentStatus {
            payment_id: body.payment_id,
            payment_status: body.payment_status,
            transaction_hash: body.payin_hash,
        })
    }
}
