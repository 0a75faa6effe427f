//! Stripe payment intent confirmation.
//!
//! Confirms with the publishable key, the way a browser checkout does:
//! `POST /v1/payment_intents/{intent}/confirm`, form-encoded, with the
//! client secret proving access to the intent.

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, instrument, warn};
use url::Url;
use uuid::Uuid;

use medusa_store_core::PaymentIntentStatus;

use super::{
    ConfirmPaymentRequest, PaymentConfirmation, PaymentConfirmer, PaymentError,
    intent_id_from_secret,
};
use crate::config::StripeConfig;

#[derive(Debug, Deserialize)]
struct PaymentIntentWire {
    status: PaymentIntentStatus,
    last_payment_error: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: Option<String>,
}

/// Payment confirmation against the Stripe API.
#[derive(Clone)]
pub struct StripeConfirmer {
    inner: Arc<StripeConfirmerInner>,
}

struct StripeConfirmerInner {
    client: reqwest::Client,
    api_base: Url,
    publishable_key: SecretString,
}

impl StripeConfirmer {
    /// Create a confirmer.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::NotConfigured`] if no publishable key is set.
    pub fn new(config: &StripeConfig) -> Result<Self, PaymentError> {
        let publishable_key = config
            .publishable_key
            .clone()
            .ok_or(PaymentError::NotConfigured)?;

        Ok(Self {
            inner: Arc::new(StripeConfirmerInner {
                client: reqwest::Client::new(),
                api_base: config.api_base.clone(),
                publishable_key,
            }),
        })
    }

    fn confirm_url(&self, intent_id: &str) -> Result<Url, PaymentError> {
        let mut url = self.inner.api_base.clone();
        url.path_segments_mut()
            .map_err(|()| PaymentError::NotConfigured)?
            .pop_if_empty()
            .extend(["v1", "payment_intents", intent_id, "confirm"]);
        Ok(url)
    }
}

/// Idempotency key for a confirmation.
///
/// Stable for a given intent and card token: resubmitting the same card
/// after a lost response replays the first result instead of confirming
/// again, while a different card gets a fresh key.
fn idempotency_key(intent_id: &str, request: &ConfirmPaymentRequest) -> String {
    let name = format!("{intent_id}:{}", request.card.token);
    Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string()
}

/// Form fields for a card confirmation.
fn confirm_form(request: &ConfirmPaymentRequest) -> Vec<(&'static str, String)> {
    let billing = &request.billing;
    vec![
        ("client_secret", request.client_secret.expose().to_string()),
        ("payment_method_data[type]", "card".to_string()),
        ("payment_method_data[card][token]", request.card.token.clone()),
        (
            "payment_method_data[billing_details][name]",
            billing.name.clone(),
        ),
        (
            "payment_method_data[billing_details][email]",
            billing.email.clone(),
        ),
        (
            "payment_method_data[billing_details][address][line1]",
            billing.address.line1.clone(),
        ),
        (
            "payment_method_data[billing_details][address][city]",
            billing.address.city.clone(),
        ),
        (
            "payment_method_data[billing_details][address][postal_code]",
            billing.address.postal_code.clone(),
        ),
        (
            "payment_method_data[billing_details][address][country]",
            billing.address.country.clone(),
        ),
    ]
}

#[async_trait]
impl PaymentConfirmer for StripeConfirmer {
    #[instrument(skip(self, request))]
    async fn confirm(
        &self,
        request: &ConfirmPaymentRequest,
    ) -> Result<PaymentConfirmation, PaymentError> {
        let intent_id = intent_id_from_secret(request.client_secret.expose())
            .ok_or(PaymentError::MalformedSecret)?;
        let url = self.confirm_url(intent_id)?;

        let response = self
            .inner
            .client
            .post(url)
            .bearer_auth(self.inner.publishable_key.expose_secret())
            .header("Idempotency-Key", idempotency_key(intent_id, request))
            .form(&confirm_form(request))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        // Card errors are a payment outcome, not a transport failure.
        if status == reqwest::StatusCode::PAYMENT_REQUIRED {
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .ok()
                .and_then(|e| e.error.message);
            warn!(intent_id, "Card was declined");
            return Ok(PaymentConfirmation {
                status: PaymentIntentStatus::Failed,
                message,
            });
        }

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .ok()
                .and_then(|e| e.error.message)
                .unwrap_or_else(|| body.chars().take(200).collect());
            tracing::error!(status = %status, intent_id, "Payment confirmation failed");
            return Err(PaymentError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let intent: PaymentIntentWire = serde_json::from_str(&body)?;
        debug!(intent_id, status = %intent.status, "Payment intent confirmed");

        Ok(PaymentConfirmation {
            status: intent.status,
            message: intent.last_payment_error.and_then(|e| e.message),
        })
    }
}
