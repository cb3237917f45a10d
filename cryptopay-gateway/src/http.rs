//! Shared request plumbing for the HTTP adapters.

use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;

/// Error type for client operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub(crate) fn build_http(timeout: Duration) -> Result<Client, ClientError> {
    Ok(Client::builder().timeout(timeout).build()?)
}

pub(crate) fn trim_base_url(base_url: impl Into<String>) -> String {
    base_url.into().trim_end_matches('/').to_string()
}

/// Decodes a success body, or turns an error status into `ClientError::Api`.
pub(crate) async fn handle_response<T: DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<T, ClientError> {
    let status = resp.status();
    if status.is_success() {
        let body = resp.text().await?;
        Ok(serde_json::from_str(&body)?)
    } else {
        Err(api_error(status, resp).await)
    }
}

pub(crate) async fn api_error(status: reqwest::StatusCode, resp: reqwest::Response) -> ClientError {
    let body = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("error"))
                .and_then(|e| e.as_str())
                .map(String::from)
        })
        .unwrap_or(body);
    ClientError::Api {
        status: status.as_u16(),
        message,
    }
}

/// Accepts an amount sent either as a JSON number or a numeric string.
pub(crate) fn f64_from_string_or_number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::Deserialize;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawAmount {
        Number(f64),
        Text(String),
    }

    match RawAmount::deserialize(deserializer)? {
        RawAmount::Number(n) => Ok(n),
        RawAmount::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}
