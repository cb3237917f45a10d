//! # Cryptopay Hex
//!
//! Application services and HTTP adapter for the crypto payment service.
//!
//! ## Architecture
//!
//! - `service` - Payment lifecycle (creation, reconciliation, webhooks, expiry)
//! - `currency` - Rate table cache and conversion
//! - `workers` - Expiry sweep and periodic rate refresh
//! - `inbound/` - HTTP adapter (Axum server)
//!
//! The payment service is generic over `R: PaymentRepository`, allowing
//! different repository implementations to be injected. Outbound ports are
//! held as trait objects.

pub mod currency;
pub mod inbound;
pub mod locks;
pub mod openapi;
pub mod service;
pub mod verifier;
pub mod workers;

#[cfg(test)]
mod currency_tests;

pub use currency::CurrencyService;
pub use inbound::{HttpServer, ServerSettings};
pub use service::{PaymentService, PaymentSettings};
pub use verifier::{SIGNATURE_HEADER, VerifyError, WebhookVerifier};
pub use workers::{ExpirySweeper, RateRefreshWorker};
