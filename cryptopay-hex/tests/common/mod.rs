//! Shared fixtures for the HTTP integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Method, Request, Response},
};
use http_body_util::BodyExt;

use cryptopay_hex::{
    CurrencyService, HttpServer, PaymentService, PaymentSettings, SIGNATURE_HEADER,
    ServerSettings, WebhookVerifier,
};
use cryptopay_repo::SqliteRepo;
use cryptopay_types::ports::{
    CreatedPayment, EstimateQuote, GatewayPaymentRequest, GatewayPaymentStatus, RateSnapshot,
};
use cryptopay_types::{
    CryptoPayment, ExchangeError, ExchangeRateProvider, FulfillmentError, GatewayError,
    GatewayStatus, OrderFulfillment, PaymentGateway,
};

pub const SECRET: &str = "integration-secret";
pub const ADMIN_KEY: &str = "integration-admin-key";

/// Gateway that hands out sequential ids and reports `waiting`.
#[derive(Default)]
pub struct StubGateway {
    created: AtomicUsize,
    statuses: Mutex<HashMap<String, GatewayStatus>>,
}

impl StubGateway {
    pub fn report(&self, payment_id: &str, status: GatewayStatus) {
        self.statuses
            .lock()
            .unwrap()
            .insert(payment_id.to_string(), status);
    }
}

#[async_trait]
impl PaymentGateway for StubGateway {
    async fn estimate(
        &self,
        amount: f64,
        currency_from: &str,
        currency_to: &str,
    ) -> Result<EstimateQuote, GatewayError> {
        Ok(EstimateQuote {
            amount_from: amount,
            currency_from: currency_from.to_string(),
            currency_to: currency_to.to_string(),
            estimated_amount: 0.00041,
        })
    }

    async fn create_payment(
        &self,
        req: &GatewayPaymentRequest,
    ) -> Result<CreatedPayment, GatewayError> {
        let n = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(CreatedPayment {
            payment_id: format!("pay-{}", n),
            pay_address: "bc1qintegration".to_string(),
            pay_amount: 0.00041,
            pay_currency: req.pay_currency.clone(),
            network: Some(req.network.clone()),
            payment_status: GatewayStatus::Waiting,
        })
    }

    async fn get_payment_status(
        &self,
        payment_id: &str,
    ) -> Result<GatewayPaymentStatus, GatewayError> {
        let status = self
            .statuses
            .lock()
            .unwrap()
            .get(payment_id)
            .copied()
            .unwrap_or(GatewayStatus::Waiting);
        Ok(GatewayPaymentStatus {
            payment_id: payment_id.to_string(),
            payment_status: status,
            transaction_hash: None,
        })
    }
}

/// Rate API that is always down.
pub struct DownRateSource;

#[async_trait]
impl ExchangeRateProvider for DownRateSource {
    async fn fetch_rates(&self, _base: &str) -> Result<RateSnapshot, ExchangeError> {
        Err(ExchangeError::ServiceUnavailable("connection refused".into()))
    }
}

/// Counts finished payments.
#[derive(Default)]
pub struct CountingFulfillment {
    pub finished: AtomicUsize,
}

#[async_trait]
impl OrderFulfillment for CountingFulfillment {
    async fn payment_finished(&self, _payment: &CryptoPayment) -> Result<(), FulfillmentError> {
        self.finished.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct TestApp {
    pub router: axum::Router,
    pub gateway: Arc<StubGateway>,
    pub fulfillment: Arc<CountingFulfillment>,
}

/// Builds the full router over an in-memory SQLite store.
pub async fn create_test_app(requests_per_minute: u32) -> TestApp {
    create_test_app_with(ServerSettings {
        requests_per_minute,
        trust_forwarded_for: false,
        admin_api_key: Some(ADMIN_KEY.to_string()),
    })
    .await
}

pub async fn create_test_app_with(settings: ServerSettings) -> TestApp {
    let repo = Arc::new(SqliteRepo::new("sqlite::memory:").await.unwrap());
    let currencies = Arc::new(
        CurrencyService::load(repo.clone(), Arc::new(DownRateSource))
            .await
            .unwrap(),
    );
    let gateway = Arc::new(StubGateway::default());
    let fulfillment = Arc::new(CountingFulfillment::default());

    let service = Arc::new(PaymentService::new(
        repo,
        gateway.clone(),
        fulfillment.clone(),
        currencies.clone(),
        WebhookVerifier::new(SECRET),
        PaymentSettings {
            price_currency: "usd".to_string(),
            callback_url: "http://localhost:8080/crypto/webhook".to_string(),
            payment_page_url: "https://pay.example/payment/?iid=".to_string(),
        },
    ));

    let server = HttpServer::with_settings(service, currencies, settings);
    TestApp {
        router: server.router(),
        gateway,
        fulfillment,
    }
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn json_request(method: Method, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// A JSON request carrying the admin key.
pub fn admin_request(method: Method, uri: &str, body: serde_json::Value) -> Request<Body> {
    let mut request = json_request(method, uri, body);
    request.headers_mut().insert(
        "Authorization",
        format!("Bearer {}", ADMIN_KEY).parse().unwrap(),
    );
    request
}

pub fn create_payment_request(order_id: &str) -> Request<Body> {
    json_request(
        Method::POST,
        "/crypto/payments",
        serde_json::json!({
            "order_id": order_id,
            "currency": "btc",
            "network": "bitcoin",
            "amount": 25.0
        }),
    )
}

/// A webhook request signed with `secret`, or unsigned when `None`.
pub fn webhook_request(body: &str, secret: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri("/crypto/webhook")
        .header("Content-Type", "application/json");
    if let Some(secret) = secret {
        let signature = WebhookVerifier::new(secret)
            .sign(body.as_bytes())
            .unwrap();
        builder = builder.header(SIGNATURE_HEADER, signature);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}
