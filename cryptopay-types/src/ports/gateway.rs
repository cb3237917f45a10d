//! Crypto payment gateway port.
//!
//! A 1:1 mapping of the three gateway calls this service makes. Adapters
//! handle transport and wire formats only.

use crate::domain::GatewayStatus;

/// Error type for gateway calls.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Transport failure or timeout.
    #[error("{0}")]
    Unavailable(String),

    /// The gateway answered with a non-success status.
    #[error("gateway returned {status}: {message}")]
    Rejected { status: u16, message: String },

    /// The gateway answered with a body we could not interpret.
    #[error("invalid gateway response: {0}")]
    InvalidResponse(String),
}

/// Estimated crypto amount for a fiat price.
#[derive(Debug, Clone, PartialEq)]
pub struct EstimateQuote {
    pub amount_from: f64,
    pub currency_from: String,
    pub currency_to: String,
    pub estimated_amount: f64,
}

/// Parameters of a new gateway payment.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayPaymentRequest {
    pub price_amount: f64,
    pub price_currency: String,
    pub pay_currency: String,
    pub network: String,
    pub order_id: String,
    pub order_description: Option<String>,
    /// Where the gateway posts status notifications
    pub ipn_callback_url: String,
}

/// The gateway's reply to a create call.
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedPayment {
    pub payment_id: String,
    pub pay_address: String,
    pub pay_amount: f64,
    pub pay_currency: String,
    pub network: Option<String>,
    pub payment_status: GatewayStatus,
}

/// Live status of a gateway payment.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayPaymentStatus {
    pub payment_id: String,
    pub payment_status: GatewayStatus,
    pub transaction_hash: Option<String>,
}

#[async_trait::async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn estimate(
        &self,
        amount: f64,
        currency_from: &str,
        currency_to: &str,
    ) -> Result<EstimateQuote, GatewayError>;

    async fn create_payment(
        &self,
        req: &GatewayPaymentRequest,
    ) -> Result<CreatedPayment, GatewayError>;

    async fn get_payment_status(
        &self,
        payment_id: &str,
    ) -> Result<GatewayPaymentStatus, GatewayError>;
}
