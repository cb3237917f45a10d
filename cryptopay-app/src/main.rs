//! # Cryptopay Application
//!
//! Binary that wires together all the components:
//! - Load configuration from flags and environment
//! - Initialize the repository adapter
//! - Build the gateway, rate API and fulfillment clients
//! - Create the currency and payment services
//! - Start the background workers and the HTTP server

mod config;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use opentelemetry::global;
use opentelemetry_sdk::{
    metrics::SdkMeterProvider, propagation::TraceContextPropagator, trace as sdktrace,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cryptopay_gateway::{GatewayClient, HttpOrderFulfillment, HttpRateSource, LoggingFulfillment};
use cryptopay_hex::{
    CurrencyService, ExpirySweeper, HttpServer, PaymentService, PaymentSettings,
    RateRefreshWorker, ServerSettings, WebhookVerifier,
};
use cryptopay_repo::build_repo;
use cryptopay_types::OrderFulfillment;

use config::{Config, LogFormat};

/// OTLP exporters, present only when an endpoint is configured.
struct Telemetry {
    tracer_provider: sdktrace::SdkTracerProvider,
    meter_provider: SdkMeterProvider,
}

impl Telemetry {
    fn shutdown(self) {
        let _ = self.tracer_provider.shutdown();
        let _ = self.meter_provider.shutdown();
    }
}

fn init_telemetry() -> anyhow::Result<Telemetry> {
    global::set_text_map_propagator(TraceContextPropagator::new());

    // Use gRPC exporter with batch processing (non-blocking)
    let span_exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .build()
        .context("failed to create OTLP span exporter")?;
    let tracer_provider = sdktrace::SdkTracerProvider::builder()
        .with_batch_exporter(span_exporter)
        .build();
    global::set_tracer_provider(tracer_provider.clone());

    // HTTP metrics from the router layer go through the global meter provider.
    let metric_exporter = opentelemetry_otlp::MetricExporter::builder()
        .with_tonic()
        .build()
        .context("failed to create OTLP metric exporter")?;
    let meter_provider = SdkMeterProvider::builder()
        .with_periodic_exporter(metric_exporter)
        .build();
    global::set_meter_provider(meter_provider.clone());

    Ok(Telemetry {
        tracer_provider,
        meter_provider,
    })
}

fn init_tracing(config: &Config) -> anyhow::Result<Option<Telemetry>> {
    let telemetry = match std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT") {
        Ok(endpoint) if !endpoint.is_empty() => Some(init_telemetry()?),
        _ => None,
    };

    let otel_layer = telemetry.as_ref().map(|t| {
        use opentelemetry::trace::TracerProvider as _;
        tracing_opentelemetry::layer().with_tracer(t.tracer_provider.tracer("cryptopay-service"))
    });
    let (json_layer, text_layer) = match config.log_format {
        LogFormat::Json => (Some(tracing_subscriber::fmt::layer().json()), None),
        LogFormat::Text => (None, Some(tracing_subscriber::fmt::layer())),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,cryptopay_app=debug,cryptopay_hex=debug".into()),
        )
        .with(json_layer)
        .with(text_layer)
        .with(otel_layer)
        .init();

    Ok(telemetry)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Config::parse();
    let telemetry = init_tracing(&config)?;

    tracing::info!("Starting cryptopay server on port {}", config.port);

    // Build repository (handles connection and migration)
    let repo = Arc::new(build_repo(&config.database_url).await?);
    tracing::info!("Using {} database", repo.backend());

    // Outbound adapters
    let gateway = Arc::new(
        GatewayClient::new(
            &config.gateway_api_url,
            &config.gateway_api_key,
            config.gateway_timeout(),
        )
        .context("failed to build gateway client")?,
    );
    let rates = Arc::new(
        HttpRateSource::new(&config.rates_api_url, config.gateway_timeout())
            .context("failed to build rate API client")?,
    );
    let fulfillment: Arc<dyn OrderFulfillment> = match &config.order_fulfillment_url {
        Some(url) => Arc::new(
            HttpOrderFulfillment::new(url, config.gateway_timeout())
                .context("failed to build order fulfillment client")?,
        ),
        None => {
            tracing::warn!("ORDER_FULFILLMENT_URL not set; finished payments are only logged");
            Arc::new(LoggingFulfillment)
        }
    };

    if config.gateway_ipn_secret.is_empty() {
        tracing::warn!("GATEWAY_IPN_SECRET is empty; every webhook will be rejected");
    }

    // Application services
    let currencies = Arc::new(CurrencyService::load(repo.clone(), rates).await?);
    let service = Arc::new(PaymentService::new(
        repo,
        gateway,
        fulfillment,
        currencies.clone(),
        WebhookVerifier::new(config.gateway_ipn_secret.clone()),
        PaymentSettings {
            price_currency: config.gateway_price_currency.clone(),
            callback_url: config.callback_url(),
            payment_page_url: config.payment_page_url.clone(),
        },
    ));

    // Background workers
    tokio::spawn(ExpirySweeper::new(service.clone(), config.expiry_sweep_interval()).run());
    tokio::spawn(
        RateRefreshWorker::new(currencies.clone(), config.rate_refresh_interval()).run(),
    );

    // Create and run the HTTP server
    let server = HttpServer::with_settings(
        service,
        currencies,
        ServerSettings {
            requests_per_minute: config.rate_limit_per_minute,
            trust_forwarded_for: config.trust_forwarded_for,
            admin_api_key: config.admin_api_key.clone(),
        },
    );
    server.run(&config.bind_addr()).await?;

    // Ensure traces and metrics are flushed before exit
    if let Some(telemetry) = telemetry {
        telemetry.shutdown();
    }
    Ok(())
}
