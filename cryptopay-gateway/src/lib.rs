//! # Cryptopay Gateway Adapters
//!
//! reqwest implementations of the outbound ports:
//! - [`GatewayClient`] talks to the crypto payment gateway
//! - [`HttpRateSource`] fetches fiat rate snapshots
//! - [`HttpOrderFulfillment`] notifies the order service of settled payments

mod fulfillment;
mod gateway;
mod http;
mod rates;

pub use fulfillment::{HttpOrderFulfillment, LoggingFulfillment};
pub use gateway::{DEFAULT_TIMEOUT, GatewayClient};
pub use http::ClientError;
pub use rates::HttpRateSource;
