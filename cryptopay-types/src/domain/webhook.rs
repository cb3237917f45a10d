//! Inbound gateway notification (IPN).

use serde::{Deserialize, Deserializer, Serialize};

use super::status::GatewayStatus;
use super::payment::StatusUpdate;
use crate::error::DomainError;

/// A status notification pushed by the gateway.
///
/// The schema is closed: the three fields this service acts on are typed,
/// the remaining fields the gateway documents are accepted but ignored, and
/// anything else is rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WebhookEvent {
    #[serde(deserialize_with = "id_from_string_or_number")]
    pub payment_id: String,
    pub payment_status: GatewayStatus,
    #[serde(default, alias = "payin_hash")]
    pub transaction_hash: Option<String>,

    #[serde(default, skip_serializing)]
    pay_address: Option<serde_json::Value>,
    #[serde(default, skip_serializing)]
    pay_amount: Option<serde_json::Value>,
    #[serde(default, skip_serializing)]
    pay_currency: Option<serde_json::Value>,
    #[serde(default, skip_serializing)]
    price_amount: Option<serde_json::Value>,
    #[serde(default, skip_serializing)]
    price_currency: Option<serde_json::Value>,
    #[serde(default, skip_serializing)]
    actually_paid: Option<serde_json::Value>,
    #[serde(default, skip_serializing)]
    outcome_amount: Option<serde_json::Value>,
    #[serde(default, skip_serializing)]
    outcome_currency: Option<serde_json::Value>,
    #[serde(default, skip_serializing)]
    order_id: Option<serde_json::Value>,
    #[serde(default, skip_serializing)]
    order_description: Option<serde_json::Value>,
    #[serde(default, skip_serializing)]
    purchase_id: Option<serde_json::Value>,
    #[serde(default, skip_serializing)]
    network: Option<serde_json::Value>,
    #[serde(default, skip_serializing)]
    created_at: Option<serde_json::Value>,
    #[serde(default, skip_serializing)]
    updated_at: Option<serde_json::Value>,
}

impl WebhookEvent {
    pub fn new(
        payment_id: impl Into<String>,
        payment_status: GatewayStatus,
        transaction_hash: Option<String>,
    ) -> Self {
        Self {
            payment_id: payment_id.into(),
            payment_status,
            transaction_hash,
            pay_address: None,
            pay_amount: None,
            pay_currency: None,
            price_amount: None,
            price_currency: None,
            actually_paid: None,
            outcome_amount: None,
            outcome_currency: None,
            order_id: None,
            order_description: None,
            purchase_id: None,
            network: None,
            created_at: None,
            updated_at: None,
        }
    }

    /// Parses a raw notification body.
    pub fn parse(raw: &[u8]) -> Result<Self, DomainError> {
        let mut event: WebhookEvent = serde_json::from_slice(raw)
            .map_err(|e| DomainError::MalformedWebhook(e.to_string()))?;
        let payment_id = event.payment_id.trim();
        if payment_id.is_empty() {
            return Err(DomainError::MalformedWebhook(
                "payment_id cannot be empty".into(),
            ));
        }
        event.payment_id = payment_id.to_string();
        Ok(event)
    }

    /// The status change this event requests.
    pub fn status_update(&self) -> StatusUpdate {
        StatusUpdate::new(self.payment_status.into(), self.transaction_hash.clone())
    }
}

/// Accepts a gateway identifier sent either as a JSON string or a number.
pub fn id_from_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(u64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Number(n) => n.to_string(),
    })
}
