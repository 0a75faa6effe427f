//! Checkout errors.

use thiserror::Error;

use super::CheckoutStep;
use super::draft::DraftField;
use crate::payment::PaymentError;

/// Errors from checkout transitions.
///
/// None of them advances the state machine; the draft is always kept.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Required draft fields are missing. No remote call was made.
    #[error("Please fill in: {}", join_fields(.0))]
    Validation(Vec<DraftField>),

    /// A step's remote side effect failed.
    #[error("Could not complete the {step} step: {reason}")]
    Step {
        /// Step the shopper is still on.
        step: CheckoutStep,
        /// Human-readable cause.
        reason: String,
    },

    /// The processor declined the payment.
    #[error("Payment declined: {message}")]
    PaymentDeclined {
        /// Processor message.
        message: String,
    },

    /// The processor needs further shopper action (e.g., 3-D Secure).
    #[error("Payment requires additional action")]
    PaymentActionRequired,

    /// The backend did not turn the cart into an order.
    #[error("Order could not be completed: {message}")]
    OrderCompletionFailed {
        /// Backend reason.
        message: String,
    },

    /// Payment confirmation could not be attempted.
    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),

    /// Checkout needs a cart with an active session.
    #[error("No active cart")]
    NoActiveCart,

    /// The operation is not valid on the current step.
    #[error("Cannot {action} from the {step} step")]
    InvalidTransition {
        step: CheckoutStep,
        action: &'static str,
    },

    /// The payment provider is not registered.
    #[error("Unknown payment provider: {0}")]
    UnknownProvider(String),

    /// The order was placed; this checkout is over.
    #[error("Checkout already completed")]
    Closed,
}

impl CheckoutError {
    /// Whether the shopper can resubmit the same step.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Step { .. }
                | Self::PaymentDeclined { .. }
                | Self::PaymentActionRequired
                | Self::OrderCompletionFailed { .. }
                | Self::Payment(_)
        )
    }
}

fn join_fields(fields: &[DraftField]) -> String {
    fields
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_lists_fields() {
        let err = CheckoutError::Validation(vec![DraftField::ContactEmail, DraftField::City]);
        assert_eq!(err.to_string(), "Please fill in: email, city");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_step_error_is_retryable() {
        let err = CheckoutError::Step {
            step: CheckoutStep::Shipping,
            reason: "Backend error 503".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Could not complete the shipping step: Backend error 503"
        );
        assert!(err.is_retryable());
    }
}
