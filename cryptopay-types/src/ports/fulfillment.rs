//! Order fulfillment port.

use crate::domain::CryptoPayment;

#[derive(Debug, thiserror::Error)]
pub enum FulfillmentError {
    #[error("Order service unavailable: {0}")]
    Unavailable(String),

    #[error("Order service rejected notification ({status}): {message}")]
    Rejected { status: u16, message: String },
}

/// Notifies the order owner that a payment settled.
///
/// Called once per payment, after the transition into `FINISHED` has been
/// persisted.
#[async_trait::async_trait]
pub trait OrderFulfillment: Send + Sync {
    async fn payment_finished(&self, payment: &CryptoPayment) -> Result<(), FulfillmentError>;
}
