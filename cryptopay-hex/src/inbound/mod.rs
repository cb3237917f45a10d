//! HTTP Inbound Adapter
//!
//! Axum-based HTTP server that drives the payment and currency services.

mod admin;
mod handlers;
mod rate_limit;
mod server;

pub use handlers::ApiError;
pub use rate_limit::RateLimiterState;
pub use server::{HttpServer, ServerSettings};
