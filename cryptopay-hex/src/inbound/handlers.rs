//! HTTP request handlers.

use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};

use cryptopay_types::{
    AddCurrencyRequest, AppError, ConvertQuery, CreateCryptoPaymentRequest, ErrorResponse,
    EstimateQuery, PaymentRepository, SetActiveRequest, SetBaseRequest,
};

use crate::PaymentService;
use crate::currency::CurrencyService;
use crate::verifier::SIGNATURE_HEADER;

/// Application state shared across handlers.
pub struct AppState<R: PaymentRepository> {
    pub service: Arc<PaymentService<R>>,
    pub currencies: Arc<CurrencyService>,
}

/// Wrapper to implement IntoResponse for AppError (orphan rule workaround).
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self.0 {
            AppError::InvalidArgument(msg) => (StatusCode::BAD_REQUEST, "INVALID_ARGUMENT", msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg),
            AppError::Upstream(msg) => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", msg),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "Internal server error".to_string(),
                )
            }
        };

        let body = ErrorResponse {
            error: message,
            code: code.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

/// Health check endpoint.
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "healthy" }))
}

// ─────────────────────────────────────────────────────────────────────────────
// Crypto payments
// ─────────────────────────────────────────────────────────────────────────────

/// Quote a fiat amount in crypto.
#[tracing::instrument(skip(state))]
pub async fn estimate<R: PaymentRepository>(
    State(state): State<Arc<AppState<R>>>,
    Query(query): Query<EstimateQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let estimate = state
        .service
        .estimate(query.amount, &query.from_currency, &query.to_currency)
        .await?;
    Ok(Json(estimate))
}

#[tracing::instrument(skip(state, req), fields(order_id = %req.order_id))]
pub async fn create_payment<R: PaymentRepository>(
    State(state): State<Arc<AppState<R>>>,
    Json(req): Json<CreateCryptoPaymentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let payment = state.service.create_payment(req).await?;
    Ok((StatusCode::CREATED, Json(payment)))
}

/// Current view of a payment, refreshed from the gateway when reachable.
#[tracing::instrument(skip(state))]
pub async fn get_payment<R: PaymentRepository>(
    State(state): State<Arc<AppState<R>>>,
    Path(payment_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let payment = state.service.get_status(&payment_id).await?;
    Ok(Json(payment))
}

/// Gateway notification. The raw body is needed for signature checks.
#[tracing::instrument(skip_all)]
pub async fn webhook<R: PaymentRepository>(
    State(state): State<Arc<AppState<R>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    let ack = state.service.apply_webhook(&body, signature).await?;
    Ok(Json(ack))
}

#[tracing::instrument(skip(state))]
pub async fn refund<R: PaymentRepository>(
    State(state): State<Arc<AppState<R>>>,
    Path(payment_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let payment = state.service.refund(&payment_id).await?;
    Ok(Json(payment))
}

#[tracing::instrument(skip(state))]
pub async fn list_order_payments<R: PaymentRepository>(
    State(state): State<Arc<AppState<R>>>,
    Path(order_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let payments = state.service.list_for_order(&order_id).await?;
    Ok(Json(payments))
}

#[tracing::instrument(skip(state))]
pub async fn active_payment<R: PaymentRepository>(
    State(state): State<Arc<AppState<R>>>,
    Path(order_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let active = state.service.has_active_payment(&order_id).await?;
    Ok(Json(active))
}

// ─────────────────────────────────────────────────────────────────────────────
// Currencies
// ─────────────────────────────────────────────────────────────────────────────

pub async fn list_currencies<R: PaymentRepository>(
    State(state): State<Arc<AppState<R>>>,
) -> impl IntoResponse {
    Json(state.currencies.list_currencies())
}

#[tracing::instrument(skip(state, req), fields(code = %req.code))]
pub async fn add_currency<R: PaymentRepository>(
    State(state): State<Arc<AppState<R>>>,
    Json(req): Json<AddCurrencyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let currency = state.currencies.add_currency(req).await?;
    Ok((StatusCode::CREATED, Json(currency)))
}

pub async fn get_rate<R: PaymentRepository>(
    State(state): State<Arc<AppState<R>>>,
    Path(code): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.currencies.get_rate(&code)?))
}

#[tracing::instrument(skip(state))]
pub async fn set_active<R: PaymentRepository>(
    State(state): State<Arc<AppState<R>>>,
    Path(code): Path<String>,
    Json(req): Json<SetActiveRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let currency = state.currencies.set_active(&code, req.is_active).await?;
    Ok(Json(currency))
}

#[tracing::instrument(skip(state))]
pub async fn set_base<R: PaymentRepository>(
    State(state): State<Arc<AppState<R>>>,
    Json(req): Json<SetBaseRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let base = state.currencies.set_base_currency(&req.code).await?;
    Ok(Json(base))
}

/// Pull fresh rates now instead of waiting for the next scheduled refresh.
#[tracing::instrument(skip(state))]
pub async fn refresh_rates<R: PaymentRepository>(
    State(state): State<Arc<AppState<R>>>,
) -> Result<impl IntoResponse, ApiError> {
    let report = state.currencies.refresh_rates().await?;
    Ok(Json(report))
}

pub async fn convert<R: PaymentRepository>(
    State(state): State<Arc<AppState<R>>>,
    Query(query): Query<ConvertQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let converted = state
        .currencies
        .convert(&query.from, &query.to, query.amount)?;
    Ok(Json(converted))
}
