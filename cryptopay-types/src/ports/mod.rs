//! Port traits (interfaces for adapters).
//!
//! These are the contracts that adapters must implement.
//! The application layer depends on these traits, not concrete implementations.

mod exchange;
mod fulfillment;
mod gateway;
mod repository;

pub use exchange::{ExchangeError, ExchangeRateProvider, RateSnapshot};
pub use fulfillment::{FulfillmentError, OrderFulfillment};
pub use gateway::{
    CreatedPayment, EstimateQuote, GatewayError, GatewayPaymentRequest, GatewayPaymentStatus,
    PaymentGateway,
};
pub use repository::{CurrencyRepository, PaymentRepository};
