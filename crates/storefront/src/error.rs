//! Unified error handling with Sentry integration.
//!
//! Provides a unified `StorefrontError` type for callers that drive several
//! components at once (the CLI, a UI shell). [`report`] captures an error to
//! Sentry and logs it; [`StorefrontError::shopper_message`] is the text safe to
//! show a shopper.

use thiserror::Error;

use crate::cart::CartError;
use crate::checkout::CheckoutError;
use crate::config::ConfigError;
use crate::gateway::GatewayError;
use crate::payment::PaymentError;
use crate::session_store::SessionStoreError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum StorefrontError {
    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Commerce backend operation failed.
    #[error("Commerce backend error: {0}")]
    Gateway(#[from] GatewayError),

    /// Payment processor operation failed.
    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),

    /// Session persistence failed.
    #[error("Session store error: {0}")]
    SessionStore(#[from] SessionStoreError),

    /// Cart operation failed.
    #[error(transparent)]
    Cart(#[from] CartError),

    /// Checkout transition failed.
    #[error(transparent)]
    Checkout(#[from] CheckoutError),
}

impl StorefrontError {
    /// Whether retrying the same action may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Gateway(e) => e.is_transient(),
            Self::Payment(PaymentError::Http(_)) => true,
            Self::Cart(e) => e.is_retryable(),
            Self::Checkout(e) => e.is_retryable(),
            Self::Config(_) | Self::Payment(_) | Self::SessionStore(_) => false,
        }
    }

    /// Message safe to show a shopper.
    ///
    /// Internal details stay in the logs.
    #[must_use]
    pub fn shopper_message(&self) -> String {
        match self {
            Self::Config(_) | Self::SessionStore(_) => "Internal error".to_string(),
            Self::Gateway(GatewayError::NotFound(_)) => "Not found".to_string(),
            Self::Gateway(GatewayError::InvalidRequest(message)) => message.clone(),
            Self::Gateway(GatewayError::RateLimited(_)) => {
                "Too many requests, please try again shortly".to_string()
            }
            Self::Gateway(_) => "The store is unavailable right now".to_string(),
            Self::Payment(_) => "Payment service error".to_string(),
            Self::Cart(CartError::RemoteMutation(GatewayError::InvalidRequest(message))) => {
                message.clone()
            }
            Self::Cart(CartError::RemoteMutation(_)) => {
                "Your cart could not be updated, please try again".to_string()
            }
            Self::Cart(e) => e.to_string(),
            Self::Checkout(CheckoutError::Payment(_)) => {
                "Payment could not be processed, please try again".to_string()
            }
            Self::Checkout(e) => e.to_string(),
        }
    }

    /// Whether the error points at a bug or outage rather than shopper input.
    fn is_internal(&self) -> bool {
        match self {
            Self::Config(_) | Self::Payment(_) | Self::SessionStore(_) => true,
            Self::Gateway(e) => !matches!(
                e,
                GatewayError::NotFound(_) | GatewayError::InvalidRequest(_)
            ),
            Self::Cart(CartError::RemoteMutation(e)) => !matches!(
                e,
                GatewayError::NotFound(_) | GatewayError::InvalidRequest(_)
            ),
            Self::Cart(_) => false,
            Self::Checkout(e) => matches!(
                e,
                CheckoutError::Payment(_) | CheckoutError::OrderCompletionFailed { .. }
            ),
        }
    }
}

/// Result type alias for `StorefrontError`.
pub type Result<T> = std::result::Result<T, StorefrontError>;

/// Log an error, capturing internal failures to Sentry.
pub fn report(err: &StorefrontError) {
    if err.is_internal() {
        let event_id = sentry::capture_error(err);
        tracing::error!(
            error = %err,
            sentry_event_id = %event_id,
            "Storefront error"
        );
    } else {
        tracing::warn!(error = %err, "Storefront error");
    }
}

/// Add a breadcrumb for shopper actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of shopper
/// actions leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Add to cart", Some(&[("variant_id", "variant_123")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkout::{CheckoutStep, DraftField};

    #[test]
    fn test_storefront_error_display() {
        let err = StorefrontError::Gateway(GatewayError::NotFound("product-123".to_string()));
        assert_eq!(err.to_string(), "Commerce backend error: Not found: product-123");

        let err = StorefrontError::Cart(CartError::NoActiveCart);
        assert_eq!(err.to_string(), "No active cart");
    }

    #[test]
    fn test_internal_details_are_hidden() {
        let err = StorefrontError::Gateway(GatewayError::Api {
            status: 500,
            message: "stack trace".to_string(),
        });
        assert_eq!(err.shopper_message(), "The store is unavailable right now");
        assert!(err.is_internal());

        let err = StorefrontError::Payment(PaymentError::NotConfigured);
        assert_eq!(err.shopper_message(), "Payment service error");
    }

    #[test]
    fn test_shopper_errors_pass_through() {
        let err = StorefrontError::Cart(CartError::RemoteMutation(GatewayError::InvalidRequest(
            "Variant is out of stock".to_string(),
        )));
        assert_eq!(err.shopper_message(), "Variant is out of stock");
        assert!(!err.is_internal());

        let err = StorefrontError::Checkout(CheckoutError::Validation(vec![DraftField::City]));
        assert_eq!(err.shopper_message(), "Please fill in: city");
    }

    #[test]
    fn test_retryable() {
        assert!(StorefrontError::Gateway(GatewayError::RateLimited(1)).is_retryable());
        assert!(
            StorefrontError::Checkout(CheckoutError::Step {
                step: CheckoutStep::Payment,
                reason: "timeout".to_string(),
            })
            .is_retryable()
        );
        assert!(!StorefrontError::Cart(CartError::InvalidQuantity).is_retryable());
    }
}
