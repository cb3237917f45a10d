//! Order fulfillment adapters.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{info, instrument};

use cryptopay_types::{CryptoPayment, FulfillmentError, OrderFulfillment, PaymentStatus};

use crate::http::{ClientError, api_error, build_http};

impl From<ClientError> for FulfillmentError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Api { status, message } => FulfillmentError::Rejected { status, message },
            other => FulfillmentError::Unavailable(other.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
struct PaymentFinishedBody<'a> {
    order_id: &'a str,
    payment_id: &'a str,
    status: PaymentStatus,
    currency: &'a str,
    amount: f64,
    price_amount: f64,
    price_currency: &'a str,
    transaction_hash: Option<&'a str>,
}

/// Posts settled payments to the order service.
pub struct HttpOrderFulfillment {
    url: String,
    http: Client,
}

impl HttpOrderFulfillment {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ClientError> {
        Ok(Self {
            url: url.into(),
            http: build_http(timeout)?,
        })
    }
}

#[async_trait]
impl OrderFulfillment for HttpOrderFulfillment {
    #[instrument(skip(self, payment), fields(order_id = %payment.order_id, payment_id = %payment.payment_id))]
    async fn payment_finished(&self, payment: &CryptoPayment) -> Result<(), FulfillmentError> {
        let body = PaymentFinishedBody {
            order_id: &payment.order_id,
            payment_id: &payment.payment_id,
            status: payment.status,
            currency: &payment.currency,
            amount: payment.amount,
            price_amount: payment.price_amount,
            price_currency: &payment.price_currency,
            transaction_hash: payment.transaction_hash.as_deref(),
        };

        let resp = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(ClientError::from)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(api_error(status, resp).await.into());
        }
        info!("order service notified");
        Ok(())
    }
}

/// Fulfillment used when no order service is configured.
pub struct LoggingFulfillment;

#[async_trait]
impl OrderFulfillment for LoggingFulfillment {
    async fn payment_finished(&self, payment: &CryptoPayment) -> Result<(), FulfillmentError> {
        info!(
            order_id = %payment.order_id,
            payment_id = %payment.payment_id,
            "payment finished; no order fulfillment endpoint configured"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use cryptopay_types::OpenPayment;
    use mockito::Matcher;

    fn finished_payment() -> CryptoPayment {
        let mut payment = CryptoPayment::open(
            OpenPayment {
                order_id: "ord-1".into(),
                payment_id: "pay-1".into(),
                currency: "btc".into(),
                network: "bitcoin".into(),
                price_amount: 25.0,
                price_currency: "usd".into(),
                amount: 0.00041,
                address: "bc1qexample".into(),
            },
            Utc::now(),
        )
        .unwrap();
        payment.status = PaymentStatus::Finished;
        payment
    }

    #[tokio::test]
    async fn test_posts_finished_payment() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/orders/paid")
            .match_body(Matcher::PartialJsonString(
                r#"{"order_id":"ord-1","payment_id":"pay-1","status":"FINISHED"}"#.into(),
            ))
            .with_status(204)
            .create_async()
            .await;

        let fulfillment =
            HttpOrderFulfillment::new(format!("{}/orders/paid", server.url()), Duration::from_secs(5))
                .unwrap();
        fulfillment.payment_finished(&finished_payment()).await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_rejection_is_reported() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/orders/paid")
            .with_status(409)
            .with_body(r#"{"error":"order already paid"}"#)
            .create_async()
            .await;

        let fulfillment =
            HttpOrderFulfillment::new(format!("{}/orders/paid", server.url()), Duration::from_secs(5))
                .unwrap();
        let result = fulfillment.payment_finished(&finished_payment()).await;

        assert!(matches!(
            result,
            Err(FulfillmentError::Rejected { status: 409, .. })
        ));
    }
}
