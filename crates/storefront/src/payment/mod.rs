//! Client-side payment confirmation.
//!
//! Confirmation-required providers issue a client secret on the cart's
//! pending payment session. A [`PaymentConfirmer`] exchanges that secret plus
//! card and billing details for a terminal (or intermediate) status.

#[cfg(any(test, feature = "mock"))]
pub mod mock;
mod stripe;

pub use stripe::StripeConfirmer;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use medusa_store_core::PaymentIntentStatus;

use crate::gateway::ClientSecret;

/// Errors that can occur while confirming a payment.
///
/// A declined card is not an error: it is a [`PaymentConfirmation`] with a
/// non-success status.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The processor answered with an unexpected status.
    #[error("Payment processor error {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Processor message.
        message: String,
    },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The client secret does not identify a payment.
    #[error("Malformed client secret")]
    MalformedSecret,

    /// No publishable key is configured.
    #[error("Payment confirmation is not configured")]
    NotConfigured,
}

/// Card input collected by the payment-capture surface.
///
/// Holds a processor-issued token, never raw card numbers.
#[derive(Clone, PartialEq, Eq)]
pub struct CardDetails {
    /// Card token (e.g., `tok_visa`).
    pub token: String,
}

impl CardDetails {
    /// Wrap a card token.
    #[must_use]
    pub fn token(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl std::fmt::Debug for CardDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CardDetails")
            .field("token", &"[REDACTED]")
            .finish()
    }
}

/// Billing address sent with a confirmation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BillingAddress {
    pub line1: String,
    pub city: String,
    pub postal_code: String,
    /// Upper-case ISO 3166-1 alpha-2 code.
    pub country: String,
}

/// Billing details sent with a confirmation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BillingDetails {
    pub name: String,
    pub email: String,
    pub address: BillingAddress,
}

/// Everything needed to confirm one payment.
#[derive(Debug, Clone)]
pub struct ConfirmPaymentRequest {
    /// Secret from the cart's pending payment session.
    pub client_secret: ClientSecret,
    /// Card to charge.
    pub card: CardDetails,
    /// Billing details.
    pub billing: BillingDetails,
}

/// Outcome reported by the processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentConfirmation {
    /// Resulting status.
    pub status: PaymentIntentStatus,
    /// Processor message (decline reason, ...).
    pub message: Option<String>,
}

impl PaymentConfirmation {
    /// Whether the order may be completed.
    #[must_use]
    pub const fn allows_completion(&self) -> bool {
        self.status.allows_completion()
    }
}

/// Confirms payments against a remote processor.
#[async_trait]
pub trait PaymentConfirmer: Send + Sync {
    /// Confirm a payment.
    ///
    /// Declines resolve to `Ok` with a non-success status; `Err` means the
    /// outcome is unknown (network failure, misconfiguration).
    async fn confirm(
        &self,
        request: &ConfirmPaymentRequest,
    ) -> Result<PaymentConfirmation, PaymentError>;
}

/// Payment intent id embedded in a client secret (`pi_123_secret_abc` → `pi_123`).
#[must_use]
pub fn intent_id_from_secret(secret: &str) -> Option<&str> {
    secret
        .split_once("_secret_")
        .map(|(intent, _)| intent)
        .filter(|intent| !intent.is_empty())
}
