//! Status enums for payment sessions, payment confirmation and cart completion.

use serde::{Deserialize, Serialize};

/// Status of a provider-scoped payment session on a cart.
///
/// Maps to the backend's payment session status values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentSessionStatus {
    #[default]
    NotInitiated,
    #[serde(alias = "requires_more")]
    Pending,
    Authorized,
    Captured,
    #[serde(alias = "cancelled")]
    Canceled,
    Error,
}

impl std::fmt::Display for PaymentSessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotInitiated => write!(f, "not_initiated"),
            Self::Pending => write!(f, "pending"),
            Self::Authorized => write!(f, "authorized"),
            Self::Captured => write!(f, "captured"),
            Self::Canceled => write!(f, "canceled"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Outcome reported by the payment confirmation provider.
///
/// Processor statuses outside this set (`processing`,
/// `requires_payment_method`, `canceled`, ...) collapse into [`Self::Failed`]
/// because none of them lets an order be placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentIntentStatus {
    Succeeded,
    RequiresCapture,
    RequiresAction,
    #[serde(other)]
    Failed,
}

impl PaymentIntentStatus {
    /// Whether the order may be completed after this outcome.
    #[must_use]
    pub const fn allows_completion(self) -> bool {
        matches!(self, Self::Succeeded | Self::RequiresCapture)
    }
}

impl std::fmt::Display for PaymentIntentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Succeeded => write!(f, "succeeded"),
            Self::RequiresCapture => write!(f, "requires_capture"),
            Self::RequiresAction => write!(f, "requires_action"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Kind tag on a cart completion response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionKind {
    /// The cart became an order.
    Order,
    /// The cart still requires action (payment not authorized, stock, ...).
    Cart,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_session_status_wire_values() {
        let parsed: PaymentSessionStatus = serde_json::from_str("\"requires_more\"").unwrap();
        assert_eq!(parsed, PaymentSessionStatus::Pending);
        let parsed: PaymentSessionStatus = serde_json::from_str("\"not_initiated\"").unwrap();
        assert_eq!(parsed, PaymentSessionStatus::NotInitiated);
    }

    #[test]
    fn test_unknown_intent_status_is_failed() {
        let parsed: PaymentIntentStatus = serde_json::from_str("\"processing\"").unwrap();
        assert_eq!(parsed, PaymentIntentStatus::Failed);
        assert!(!parsed.allows_completion());
    }

    #[test]
    fn test_intent_status_allows_completion() {
        assert!(PaymentIntentStatus::Succeeded.allows_completion());
        assert!(PaymentIntentStatus::RequiresCapture.allows_completion());
        assert!(!PaymentIntentStatus::RequiresAction.allows_completion());
    }
}
