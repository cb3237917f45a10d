//! Admin key middleware for the administrative endpoints.
//!
//! Refunds and every write to the currency table require the configured
//! admin key. Without a configured key those endpoints always answer 401.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{Method, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use cryptopay_types::AppError;

use super::handlers::ApiError;

/// Digest of the configured admin key.
pub struct AdminAuth {
    key_hash: Option<[u8; 32]>,
}

impl AdminAuth {
    /// A blank key leaves the administrative endpoints closed.
    pub fn new(admin_key: Option<&str>) -> Self {
        let key_hash = admin_key
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(hash_key);
        Self { key_hash }
    }

    pub fn is_configured(&self) -> bool {
        self.key_hash.is_some()
    }

    fn accepts(&self, presented: &str) -> bool {
        match &self.key_hash {
            Some(expected) => bool::from(hash_key(presented)[..].ct_eq(&expected[..])),
            None => false,
        }
    }
}

fn hash_key(key: &str) -> [u8; 32] {
    Sha256::digest(key.as_bytes()).into()
}

/// Expected format: "Bearer <key>" or just "<key>".
fn extract_api_key(auth_header: Option<&str>) -> Option<&str> {
    let header = auth_header?;
    Some(header.strip_prefix("Bearer ").unwrap_or(header).trim())
}

/// Refunds and currency-table writes.
fn is_admin_route(method: &Method, path: &str) -> bool {
    let currency_write = path.starts_with("/currencies") && *method != Method::GET;
    let refund = *method == Method::POST
        && path.starts_with("/crypto/payments/")
        && path.ends_with("/refund");
    currency_write || refund
}

/// Rejects administrative requests that do not carry the admin key.
pub async fn admin_auth_middleware(
    State(auth): State<Arc<AdminAuth>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !is_admin_route(request.method(), request.uri().path()) {
        return next.run(request).await;
    }

    let auth_header = request
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok());

    match extract_api_key(auth_header) {
        Some(key) if !key.is_empty() && auth.accepts(key) => next.run(request).await,
        Some(key) if !key.is_empty() => {
            tracing::warn!(path = %request.uri().path(), "rejected admin request: invalid key");
            unauthorized("Invalid admin key")
        }
        _ => unauthorized("Missing or invalid Authorization header"),
    }
}

fn unauthorized(message: &str) -> Response {
    ApiError(AppError::Unauthorized(message.to_string())).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_api_key_bearer() {
        assert_eq!(extract_api_key(Some("Bearer sk_admin")), Some("sk_admin"));
    }

    #[test]
    fn test_extract_api_key_raw() {
        assert_eq!(extract_api_key(Some("sk_admin")), Some("sk_admin"));
    }

    #[test]
    fn test_extract_api_key_none() {
        assert_eq!(extract_api_key(None), None);
    }

    #[test]
    fn test_admin_routes() {
        assert!(is_admin_route(&Method::POST, "/crypto/payments/pay-1/refund"));
        assert!(is_admin_route(&Method::POST, "/currencies"));
        assert!(is_admin_route(&Method::PUT, "/currencies/base"));
        assert!(is_admin_route(&Method::POST, "/currencies/refresh"));
        assert!(is_admin_route(&Method::PUT, "/currencies/EUR/active"));

        assert!(!is_admin_route(&Method::GET, "/currencies"));
        assert!(!is_admin_route(&Method::GET, "/currencies/convert"));
        assert!(!is_admin_route(&Method::POST, "/crypto/payments"));
        assert!(!is_admin_route(&Method::POST, "/crypto/webhook"));
        assert!(!is_admin_route(&Method::GET, "/crypto/payments/pay-1"));
    }

    #[test]
    fn test_key_comparison() {
        let auth = AdminAuth::new(Some("sk_admin"));

        assert!(auth.is_configured());
        assert!(auth.accepts("sk_admin"));
        assert!(!auth.accepts("sk_other"));
    }

    #[test]
    fn test_blank_key_accepts_nothing() {
        let auth = AdminAuth::new(Some("  "));

        assert!(!auth.is_configured());
        assert!(!auth.accepts(""));
        assert!(!AdminAuth::new(None).accepts("anything"));
    }
}
