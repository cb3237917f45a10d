//! HTTP Server configuration and startup.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router, middleware,
    routing::{get, post, put},
};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use cryptopay_types::PaymentRepository;

use super::admin::{AdminAuth, admin_auth_middleware};
use super::handlers::{self, AppState};
use super::rate_limit::{RateLimiterState, rate_limit_middleware};
use crate::PaymentService;
use crate::currency::CurrencyService;
use crate::openapi::ApiDoc;

/// Tunables for the HTTP adapter.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub requests_per_minute: u32,
    /// Key clients by `X-Forwarded-For` instead of the peer address.
    pub trust_forwarded_for: bool,
    /// Key required by the refund and currency-write endpoints.
    pub admin_api_key: Option<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            requests_per_minute: 100,
            trust_forwarded_for: false,
            admin_api_key: None,
        }
    }
}

/// HTTP Server for the crypto payments API.
pub struct HttpServer<R: PaymentRepository> {
    state: Arc<AppState<R>>,
    rate_limiter: Arc<RateLimiterState>,
    admin: Arc<AdminAuth>,
}

impl<R: PaymentRepository> HttpServer<R> {
    /// Creates a new HTTP server with default settings. Administrative
    /// endpoints stay closed until an admin key is configured.
    pub fn new(service: Arc<PaymentService<R>>, currencies: Arc<CurrencyService>) -> Self {
        Self::with_settings(service, currencies, ServerSettings::default())
    }

    pub fn with_settings(
        service: Arc<PaymentService<R>>,
        currencies: Arc<CurrencyService>,
        settings: ServerSettings,
    ) -> Self {
        let admin = AdminAuth::new(settings.admin_api_key.as_deref());
        if !admin.is_configured() {
            tracing::warn!("no admin key configured; refund and currency writes are disabled");
        }

        Self {
            state: Arc::new(AppState {
                service,
                currencies,
            }),
            rate_limiter: Arc::new(
                RateLimiterState::new(settings.requests_per_minute, Duration::from_secs(60))
                    .trusting_forwarded_for(settings.trust_forwarded_for),
            ),
            admin: Arc::new(admin),
        }
    }

    /// Builds the Axum router with all routes.
    pub fn router(&self) -> Router {
        // Build HTTP metrics layer (uses globally set MeterProvider)
        let metrics = axum_otel_metrics::HttpMetricsLayerBuilder::new().build();

        Router::new()
            .route("/health", get(handlers::health))
            .route("/crypto/estimate", post(handlers::estimate::<R>))
            .route("/crypto/payments", post(handlers::create_payment::<R>))
            .route(
                "/crypto/payments/{payment_id}",
                get(handlers::get_payment::<R>),
            )
            .route(
                "/crypto/payments/{payment_id}/refund",
                post(handlers::refund::<R>),
            )
            .route("/crypto/webhook", post(handlers::webhook::<R>))
            .route(
                "/crypto/orders/{order_id}/payments",
                get(handlers::list_order_payments::<R>),
            )
            .route(
                "/crypto/orders/{order_id}/active-payment",
                get(handlers::active_payment::<R>),
            )
            .route(
                "/currencies",
                get(handlers::list_currencies::<R>).post(handlers::add_currency::<R>),
            )
            .route("/currencies/base", put(handlers::set_base::<R>))
            .route("/currencies/refresh", post(handlers::refresh_rates::<R>))
            .route("/currencies/convert", get(handlers::convert::<R>))
            .route("/currencies/{code}/rate", get(handlers::get_rate::<R>))
            .route("/currencies/{code}/active", put(handlers::set_active::<R>))
            .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
            .layer(middleware::from_fn_with_state(
                self.admin.clone(),
                admin_auth_middleware,
            ))
            .layer(metrics)
            .layer(middleware::from_fn_with_state(
                self.rate_limiter.clone(),
                rate_limit_middleware,
            ))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Runs the server on the given address with graceful shutdown.
    pub async fn run(self, addr: &str) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("Server listening on {}", listener.local_addr()?);

        tokio::spawn(
            self.rate_limiter
                .clone()
                .run_eviction(Duration::from_secs(60)),
        );

        axum::serve(
            listener,
            self.router()
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await?;

        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown...");
}
