//! # Cryptopay Types
//!
//! Domain types and port traits for the crypto payment lifecycle engine.
//! This crate has ZERO external IO dependencies - only data structures,
//! business rules, and trait definitions.
//!
//! ## Architecture
//!
//! This crate represents the **innermost core** of the hexagonal architecture:
//! - `domain/` - Pure domain types (CryptoPayment, PaymentStatus, WebhookEvent)
//! - `ports/` - Trait definitions that adapters must implement
//! - `dto/` - Data Transfer Objects for API boundaries
//! - `error/` - Domain and application error types

pub mod domain;
pub mod dto;
pub mod error;
pub mod ports;

// Re-export commonly used types
pub use domain::{
    CryptoPayment, GatewayStatus, OpenPayment, PAYMENT_WINDOW_HOURS, PaymentStatus, StatusUpdate,
    Transition, WebhookEvent,
};
pub use dto::*;
pub use error::{AppError, DomainError, RepoError};
pub use exchange_rates::{Currency, RateError, RateTable, RefreshReport};
pub use ports::{
    CurrencyRepository, ExchangeError, ExchangeRateProvider, FulfillmentError, GatewayError,
    OrderFulfillment, PaymentGateway, PaymentRepository,
};
