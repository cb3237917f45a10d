//! Domain models for the crypto payment service.

pub mod payment;
pub mod status;
pub mod webhook;

pub use payment::{CryptoPayment, OpenPayment, PAYMENT_WINDOW_HOURS, StatusUpdate, Transition};
pub use status::{GatewayStatus, PaymentStatus};
pub use webhook::{WebhookEvent, id_from_string_or_number};
