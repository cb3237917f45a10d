//! OpenAPI specification and documentation.

#![allow(dead_code)] // Path functions are only used by utoipa for documentation generation

use cryptopay_types::dto::{
    ActivePaymentResponse, AddCurrencyRequest, ConvertQuery, ConvertResponse,
    CreateCryptoPaymentRequest, ErrorResponse, EstimateQuery, EstimateResponse, PaymentResponse,
    RateResponse, SetActiveRequest, SetBaseRequest, WebhookAck,
};
use cryptopay_types::{Currency, PaymentStatus, RefreshReport};
use utoipa::{
    Modify, OpenApi,
    openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme},
};

// Dummy functions to generate path documentation
// These are not the actual handlers, just for OpenAPI path generation

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is healthy", body = inline(serde_json::Value), example = json!({"status": "healthy"}))
    )
)]
async fn health() {}

/// Estimate the crypto amount for a fiat price
#[utoipa::path(
    post,
    path = "/crypto/estimate",
    tag = "payments",
    params(EstimateQuery),
    responses(
        (status = 200, description = "Gateway estimate", body = EstimateResponse),
        (status = 400, description = "Invalid amount", body = ErrorResponse),
        (status = 502, description = "Gateway unavailable", body = ErrorResponse)
    )
)]
async fn estimate() {}

/// Open a crypto payment for an order
#[utoipa::path(
    post,
    path = "/crypto/payments",
    tag = "payments",
    request_body = CreateCryptoPaymentRequest,
    responses(
        (status = 201, description = "Payment created", body = PaymentResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 409, description = "Order already has an active payment", body = ErrorResponse),
        (status = 502, description = "Gateway unavailable", body = ErrorResponse)
    )
)]
async fn create_payment() {}

/// Current view of a payment, refreshed from the gateway when reachable
#[utoipa::path(
    get,
    path = "/crypto/payments/{payment_id}",
    tag = "payments",
    params(
        ("payment_id" = String, Path, description = "Gateway payment id")
    ),
    responses(
        (status = 200, description = "Payment details", body = PaymentResponse),
        (status = 404, description = "Payment not found", body = ErrorResponse)
    )
)]
async fn get_payment() {}

/// Refund a payment
#[utoipa::path(
    post,
    path = "/crypto/payments/{payment_id}/refund",
    tag = "payments",
    params(
        ("payment_id" = String, Path, description = "Gateway payment id")
    ),
    security(("admin_key" = [])),
    responses(
        (status = 200, description = "Payment refunded", body = PaymentResponse),
        (status = 401, description = "Missing or invalid admin key", body = ErrorResponse),
        (status = 404, description = "Payment not found", body = ErrorResponse)
    )
)]
async fn refund() {}

/// Gateway status notification
#[utoipa::path(
    post,
    path = "/crypto/webhook",
    tag = "payments",
    request_body(
        content = inline(serde_json::Value),
        description = "Gateway notification",
        example = json!({"payment_id": "pay-1", "payment_status": "confirmed", "transaction_hash": "0xabc"})
    ),
    security(("gateway_signature" = [])),
    responses(
        (status = 200, description = "Notification accepted or ignored as stale", body = WebhookAck),
        (status = 400, description = "Malformed notification", body = ErrorResponse),
        (status = 401, description = "Signature missing or invalid", body = ErrorResponse),
        (status = 404, description = "Unknown payment", body = ErrorResponse)
    )
)]
async fn webhook() {}

/// All payments ever opened for an order
#[utoipa::path(
    get,
    path = "/crypto/orders/{order_id}/payments",
    tag = "orders",
    params(
        ("order_id" = String, Path, description = "External order reference")
    ),
    responses(
        (status = 200, description = "Payments, oldest first", body = Vec<PaymentResponse>)
    )
)]
async fn list_order_payments() {}

/// Whether an order has a payment still in flight
#[utoipa::path(
    get,
    path = "/crypto/orders/{order_id}/active-payment",
    tag = "orders",
    params(
        ("order_id" = String, Path, description = "External order reference")
    ),
    responses(
        (status = 200, description = "Active payment lookup", body = ActivePaymentResponse)
    )
)]
async fn active_payment() {}

/// List currencies
#[utoipa::path(
    get,
    path = "/currencies",
    tag = "currencies",
    responses(
        (status = 200, description = "All known currencies", body = Vec<Currency>)
    )
)]
async fn list_currencies() {}

/// Add a currency
#[utoipa::path(
    post,
    path = "/currencies",
    tag = "currencies",
    request_body = AddCurrencyRequest,
    security(("admin_key" = [])),
    responses(
        (status = 201, description = "Currency added", body = Currency),
        (status = 401, description = "Missing or invalid admin key", body = ErrorResponse),
        (status = 400, description = "Invalid rate", body = ErrorResponse),
        (status = 409, description = "Currency already exists", body = ErrorResponse)
    )
)]
async fn add_currency() {}

/// Rate of a currency against the base
#[utoipa::path(
    get,
    path = "/currencies/{code}/rate",
    tag = "currencies",
    params(
        ("code" = String, Path, description = "ISO currency code")
    ),
    responses(
        (status = 200, description = "Current rate", body = RateResponse),
        (status = 404, description = "Unknown or inactive currency", body = ErrorResponse)
    )
)]
async fn get_rate() {}

/// Activate or deactivate a currency
#[utoipa::path(
    put,
    path = "/currencies/{code}/active",
    tag = "currencies",
    params(
        ("code" = String, Path, description = "ISO currency code")
    ),
    request_body = SetActiveRequest,
    security(("admin_key" = [])),
    responses(
        (status = 200, description = "Currency updated", body = Currency),
        (status = 401, description = "Missing or invalid admin key", body = ErrorResponse),
        (status = 400, description = "The base currency cannot be deactivated", body = ErrorResponse),
        (status = 404, description = "Unknown currency", body = ErrorResponse)
    )
)]
async fn set_active() {}

/// Change the base currency
#[utoipa::path(
    put,
    path = "/currencies/base",
    tag = "currencies",
    request_body = SetBaseRequest,
    security(("admin_key" = [])),
    responses(
        (status = 200, description = "New base currency", body = Currency),
        (status = 401, description = "Missing or invalid admin key", body = ErrorResponse),
        (status = 404, description = "Unknown or inactive currency", body = ErrorResponse)
    )
)]
async fn set_base() {}

/// Refresh rates from the rate API
#[utoipa::path(
    post,
    path = "/currencies/refresh",
    tag = "currencies",
    security(("admin_key" = [])),
    responses(
        (status = 200, description = "Refresh outcome", body = RefreshReport),
        (status = 401, description = "Missing or invalid admin key", body = ErrorResponse),
        (status = 502, description = "Rate API unavailable", body = ErrorResponse)
    )
)]
async fn refresh_rates() {}

/// Convert an amount between currencies
#[utoipa::path(
    get,
    path = "/currencies/convert",
    tag = "currencies",
    params(ConvertQuery),
    responses(
        (status = 200, description = "Converted amount", body = ConvertResponse),
        (status = 400, description = "Invalid amount", body = ErrorResponse),
        (status = 404, description = "Unknown or inactive currency", body = ErrorResponse)
    )
)]
async fn convert() {}

/// OpenAPI documentation for the crypto payments API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Crypto Payments API",
        version = "1.0.0",
        description = "Crypto payment lifecycle and currency conversion.\n\n## Webhooks\n\nGateway notifications must carry an HMAC-SHA512 hex digest of the raw body in the `X-Gateway-Signature` header.",
        license(name = "MIT"),
    ),
    paths(
        health,
        estimate,
        create_payment,
        get_payment,
        refund,
        webhook,
        list_order_payments,
        active_payment,
        list_currencies,
        add_currency,
        get_rate,
        set_active,
        set_base,
        refresh_rates,
        convert,
    ),
    components(
        schemas(
            EstimateResponse,
            CreateCryptoPaymentRequest,
            PaymentResponse,
            PaymentStatus,
            WebhookAck,
            ActivePaymentResponse,
            Currency,
            AddCurrencyRequest,
            SetActiveRequest,
            SetBaseRequest,
            RateResponse,
            ConvertResponse,
            RefreshReport,
            ErrorResponse,
        )
    ),

    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "payments", description = "Crypto payment lifecycle"),
        (name = "orders", description = "Payments by order"),
        (name = "currencies", description = "Exchange rates and conversion"),
    )
)]
pub struct ApiDoc;

/// Security schemes: the gateway's webhook signature and the admin key.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "gateway_signature",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("X-Gateway-Signature"))),
            );
            components.add_security_scheme(
                "admin_key",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
            );
        }
    }
}
