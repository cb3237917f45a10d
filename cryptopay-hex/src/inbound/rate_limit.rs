//! Rate limiting middleware using Governor.
//!
//! One keyed token-bucket limiter for all clients. Clients are keyed by the
//! peer address; the first `X-Forwarded-For` hop is used instead only when
//! the server runs behind a trusted proxy.

use axum::{
    Json,
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use serde_json::json;
use std::{net::SocketAddr, num::NonZeroU32, sync::Arc, time::Duration};

/// Paths never subject to rate limiting. The gateway must always be able to
/// deliver notifications.
const EXEMPT_PATHS: [&str; 2] = ["/health", "/crypto/webhook"];

/// Rate limiter state shared across requests.
pub struct RateLimiterState {
    limiter: DefaultKeyedRateLimiter<String>,
    trust_forwarded_for: bool,
}

impl Default for RateLimiterState {
    fn default() -> Self {
        Self::new(100, Duration::from_secs(60))
    }
}

impl RateLimiterState {
    /// Allows `requests` per `period`, all of which may arrive as a burst.
    pub fn new(requests: u32, period: Duration) -> Self {
        let burst = NonZeroU32::new(requests).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::with_period(period / burst.get())
            .map(|q| q.allow_burst(burst))
            .unwrap_or_else(|| Quota::per_minute(burst));

        Self {
            limiter: RateLimiter::keyed(quota),
            trust_forwarded_for: false,
        }
    }

    /// Keys clients by the first `X-Forwarded-For` hop. Only safe behind a
    /// proxy that overwrites the header.
    pub fn trusting_forwarded_for(mut self, trust: bool) -> Self {
        self.trust_forwarded_for = trust;
        self
    }

    /// Returns true if the request is allowed, false if rate limited.
    pub fn check(&self, key: &str) -> bool {
        self.limiter.check_key(&key.to_string()).is_ok()
    }

    /// Drops clients whose bucket has fully refilled.
    pub fn evict_idle(&self) {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
    }

    /// Number of clients currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.limiter.len()
    }

    /// Periodically evicts idle clients until the process exits.
    pub async fn run_eviction(self: Arc<Self>, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            self.evict_idle();
            tracing::debug!(clients = self.tracked_clients(), "evicted idle rate limiters");
        }
    }

    fn client_key(&self, request: &Request<Body>) -> String {
        let forwarded = self
            .trust_forwarded_for
            .then(|| {
                request
                    .headers()
                    .get("x-forwarded-for")
                    .and_then(|h| h.to_str().ok())
                    .and_then(|s| s.split(',').next())
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
            })
            .flatten();

        forwarded
            .or_else(|| {
                request
                    .extensions()
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(addr)| addr.ip().to_string())
            })
            .unwrap_or_else(|| "anonymous".to_string())
    }
}

/// Rate limiting middleware.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiterState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if EXEMPT_PATHS.contains(&request.uri().path()) {
        return next.run(request).await;
    }

    let key = limiter.client_key(&request);
    if !limiter.check(&key) {
        tracing::warn!(client = %key, "rate limit exceeded");
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({
                "error": "Rate limit exceeded. Please try again later.",
                "code": "RATE_LIMITED",
                "retry_after_seconds": 60
            })),
        )
            .into_response();
    }

    next.run(request).await
}
