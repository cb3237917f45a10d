//! Payment state machine vocabulary.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::DomainError;

/// Lifecycle state of a [`CryptoPayment`](super::CryptoPayment).
///
/// Success path: `New → Confirming → Confirmed → Finished`. `New` may expire,
/// `Confirming` may fail, and any state may be administratively refunded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    New,
    Confirming,
    Confirmed,
    Finished,
    Failed,
    Expired,
    Refunded,
}

impl PaymentStatus {
    /// Monotonic rank. Terminal outcomes share a rank so none can replace another.
    pub fn rank(self) -> i32 {
        match self {
            PaymentStatus::New => 0,
            PaymentStatus::Confirming => 1,
            PaymentStatus::Confirmed => 2,
            PaymentStatus::Finished | PaymentStatus::Failed | PaymentStatus::Expired => 3,
            PaymentStatus::Refunded => 4,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PaymentStatus::Finished
                | PaymentStatus::Failed
                | PaymentStatus::Expired
                | PaymentStatus::Refunded
        )
    }

    /// `Refunded` is applied regardless of rank.
    pub fn is_override(self) -> bool {
        self == PaymentStatus::Refunded
    }

    /// Whether a payment currently in `self` accepts a move to `next`.
    pub fn can_advance_to(self, next: PaymentStatus) -> bool {
        if next.is_override() {
            return self != next;
        }
        next.rank() > self.rank()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::New => "NEW",
            PaymentStatus::Confirming => "CONFIRMING",
            PaymentStatus::Confirmed => "CONFIRMED",
            PaymentStatus::Finished => "FINISHED",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Expired => "EXPIRED",
            PaymentStatus::Refunded => "REFUNDED",
        }
    }

    pub fn all() -> &'static [PaymentStatus] {
        &[
            PaymentStatus::New,
            PaymentStatus::Confirming,
            PaymentStatus::Confirmed,
            PaymentStatus::Finished,
            PaymentStatus::Failed,
            PaymentStatus::Expired,
            PaymentStatus::Refunded,
        ]
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PaymentStatus::all()
            .iter()
            .copied()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| DomainError::UnknownStatus(s.to_string()))
    }
}

/// Status strings reported by the payment gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GatewayStatus {
    Waiting,
    Confirming,
    Confirmed,
    Sending,
    PartiallyPaid,
    Finished,
    Failed,
    Refunded,
    Expired,
}

impl GatewayStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            GatewayStatus::Waiting => "waiting",
            GatewayStatus::Confirming => "confirming",
            GatewayStatus::Confirmed => "confirmed",
            GatewayStatus::Sending => "sending",
            GatewayStatus::PartiallyPaid => "partially_paid",
            GatewayStatus::Finished => "finished",
            GatewayStatus::Failed => "failed",
            GatewayStatus::Refunded => "refunded",
            GatewayStatus::Expired => "expired",
        }
    }
}

impl std::fmt::Display for GatewayStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for GatewayStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "waiting" => Ok(GatewayStatus::Waiting),
            "confirming" => Ok(GatewayStatus::Confirming),
            "confirmed" => Ok(GatewayStatus::Confirmed),
            "sending" => Ok(GatewayStatus::Sending),
            "partially_paid" => Ok(GatewayStatus::PartiallyPaid),
            "finished" => Ok(GatewayStatus::Finished),
            "failed" => Ok(GatewayStatus::Failed),
            "refunded" => Ok(GatewayStatus::Refunded),
            "expired" => Ok(GatewayStatus::Expired),
            other => Err(DomainError::UnknownGatewayStatus(other.to_string())),
        }
    }
}

impl From<GatewayStatus> for PaymentStatus {
    fn from(status: GatewayStatus) -> Self {
        match status {
            GatewayStatus::Waiting => PaymentStatus::New,
            GatewayStatus::Confirming => PaymentStatus::Confirming,
            GatewayStatus::Confirmed | GatewayStatus::Sending | GatewayStatus::PartiallyPaid => {
                PaymentStatus::Confirmed
            }
            GatewayStatus::Finished => PaymentStatus::Finished,
            GatewayStatus::Failed => PaymentStatus::Failed,
            GatewayStatus::Refunded => PaymentStatus::Refunded,
            GatewayStatus::Expired => PaymentStatus::Expired,
        }
    }
}
