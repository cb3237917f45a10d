//! Data Transfer Objects (DTOs) for requests and responses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::{CryptoPayment, PaymentStatus};

// ─────────────────────────────────────────────────────────────────────────────
// Payment DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Query for a crypto estimate of a fiat price.
#[derive(Debug, Clone, Serialize, Deserialize, IntoParams)]
pub struct EstimateQuery {
    /// Fiat amount to price
    pub amount: f64,
    /// Fiat currency of `amount`
    pub from_currency: String,
    /// Crypto asset to estimate in
    pub to_currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EstimateResponse {
    #[schema(example = 0.00041)]
    pub estimated_amount: f64,
    #[schema(example = "btc")]
    pub currency: String,
}

/// Request to open a crypto payment for an order.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateCryptoPaymentRequest {
    /// External order reference
    #[schema(example = "ord-1")]
    pub order_id: String,
    /// Crypto asset to pay with
    #[schema(example = "btc")]
    pub currency: String,
    #[schema(example = "bitcoin")]
    pub network: String,
    /// Fiat price of the order
    #[schema(example = 25.0)]
    pub amount: f64,
    /// Fiat currency of `amount`; defaults to the gateway pricing currency
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Public view of a payment.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaymentResponse {
    /// Gateway payment identifier
    #[schema(example = "pay-1")]
    pub payment_id: String,
    pub order_id: String,
    pub currency: String,
    pub network: String,
    /// Crypto amount to send
    pub amount: f64,
    pub price_amount: f64,
    pub price_currency: String,
    /// Deposit address
    pub address: String,
    /// Wallet URI (`<currency>:<address>?amount=<amount>`)
    pub qr_code: String,
    pub status: PaymentStatus,
    pub transaction_hash: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Hosted payment page for this payment
    pub transaction_url: String,
}

impl PaymentResponse {
    pub fn from_payment(payment: &CryptoPayment, payment_page_url: &str) -> Self {
        Self {
            payment_id: payment.payment_id.clone(),
            order_id: payment.order_id.clone(),
            currency: payment.currency.clone(),
            network: payment.network.clone(),
            amount: payment.amount,
            price_amount: payment.price_amount,
            price_currency: payment.price_currency.clone(),
            address: payment.address.clone(),
            qr_code: qr_payload(&payment.currency, &payment.address, payment.amount),
            status: payment.status,
            transaction_hash: payment.transaction_hash.clone(),
            expires_at: payment.expires_at,
            created_at: payment.created_at,
            updated_at: payment.updated_at,
            transaction_url: format!("{}{}", payment_page_url, payment.payment_id),
        }
    }
}

/// Wallet URI a QR code encodes.
pub fn qr_payload(currency: &str, address: &str, amount: f64) -> String {
    format!("{}:{}?amount={}", currency, address, amount)
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ActivePaymentResponse {
    pub order_id: String,
    pub has_active_payment: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment: Option<PaymentResponse>,
}

/// Acknowledgement returned to the gateway.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WebhookAck {
    pub payment_id: String,
    /// Status after processing
    pub status: PaymentStatus,
    /// False when the event was stale or a redelivery
    pub applied: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Currency DTOs
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AddCurrencyRequest {
    #[schema(example = "JPY")]
    pub code: String,
    #[schema(example = "Japanese Yen")]
    pub name: String,
    #[schema(example = "¥")]
    pub symbol: String,
    /// Units of this currency per one unit of the base
    #[schema(example = 149.5)]
    pub exchange_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SetActiveRequest {
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SetBaseRequest {
    #[schema(example = "EUR")]
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RateResponse {
    pub code: String,
    pub base: String,
    pub rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, IntoParams)]
pub struct ConvertQuery {
    pub from: String,
    pub to: String,
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConvertResponse {
    pub from: String,
    pub to: String,
    pub amount: f64,
    /// Converted amount, 6 decimal places
    #[schema(example = 92.0)]
    pub result: f64,
}

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// JSON body of every error response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    #[schema(example = "payment already in progress")]
    pub error: String,
    #[schema(example = "CONFLICT")]
    pub code: String,
}
