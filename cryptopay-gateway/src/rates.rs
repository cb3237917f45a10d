//! Fiat exchange rate API client.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::instrument;

use cryptopay_types::{ExchangeError, ExchangeRateProvider, ports::RateSnapshot};

use crate::http::{ClientError, build_http, handle_response, trim_base_url};

impl From<ClientError> for ExchangeError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Http(e) if e.is_decode() => ExchangeError::InvalidResponse(e.to_string()),
            ClientError::Http(e) => ExchangeError::ServiceUnavailable(e.to_string()),
            ClientError::Api { status, message } => {
                ExchangeError::ServiceUnavailable(format!("{} - {}", status, message))
            }
            ClientError::Json(e) => ExchangeError::InvalidResponse(e.to_string()),
        }
    }
}

/// `GET {base_url}/{BASE}` response.
#[derive(Debug, Deserialize)]
struct RatesBody {
    #[serde(default)]
    base_code: Option<String>,
    rates: HashMap<String, f64>,
}

/// Fetches full rate snapshots from an open-exchange-rates style API.
pub struct HttpRateSource {
    base_url: String,
    http: Client,
}

impl HttpRateSource {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ClientError> {
        Ok(Self {
            base_url: trim_base_url(base_url),
            http: build_http(timeout)?,
        })
    }
}

#[async_trait]
impl ExchangeRateProvider for HttpRateSource {
    #[instrument(skip(self))]
    async fn fetch_rates(&self, base: &str) -> Result<RateSnapshot, ExchangeError> {
        let base = base.trim().to_uppercase();
        let resp = self
            .http
            .get(format!("{}/{}", self.base_url, base))
            .send()
            .await
            .map_err(ClientError::from)?;

        let body: RatesBody = handle_response(resp).await?;

        if let Some(actual) = body.base_code.map(|c| c.to_uppercase()) {
            if actual != base {
                return Err(ExchangeError::BaseMismatch {
                    expected: base,
                    actual,
                });
            }
        }
        if body.rates.is_empty() {
            return Err(ExchangeError::InvalidResponse("empty rate snapshot".into()));
        }

        Ok(RateSnapshot {
            base,
            rates: body.rates,
        })
    }
}
