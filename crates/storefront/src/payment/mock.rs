//! Scripted payment confirmer for deterministic testing.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use medusa_store_core::PaymentIntentStatus;

use super::{
    BillingDetails, ConfirmPaymentRequest, PaymentConfirmation, PaymentConfirmer, PaymentError,
};

/// One scripted answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedOutcome {
    /// Answer with a status and optional message.
    Status(PaymentIntentStatus, Option<String>),
    /// Fail as if the processor were unreachable.
    Unavailable,
}

/// A confirmation the mock received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedConfirmation {
    pub client_secret: String,
    pub card_token: String,
    pub billing: BillingDetails,
}

/// Mock payment confirmer.
///
/// Answers from a queue of scripted outcomes and falls back to `succeeded`
/// once the queue is empty.
#[derive(Debug, Clone, Default)]
pub struct MockConfirmer {
    inner: Arc<Mutex<MockConfirmerInner>>,
}

#[derive(Debug, Default)]
struct MockConfirmerInner {
    script: VecDeque<ScriptedOutcome>,
    calls: Vec<RecordedConfirmation>,
}

impl MockConfirmer {
    /// Create a confirmer that approves everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockConfirmerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue the next answer.
    pub fn push(&self, outcome: ScriptedOutcome) {
        self.state().script.push_back(outcome);
    }

    /// Queue a decline with a processor message.
    pub fn decline_next(&self, message: &str) {
        self.push(ScriptedOutcome::Status(
            PaymentIntentStatus::Failed,
            Some(message.to_string()),
        ));
    }

    /// Confirmations received so far.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedConfirmation> {
        self.state().calls.clone()
    }
}

#[async_trait]
impl PaymentConfirmer for MockConfirmer {
    async fn confirm(
        &self,
        request: &ConfirmPaymentRequest,
    ) -> Result<PaymentConfirmation, PaymentError> {
        let mut state = self.state();
        state.calls.push(RecordedConfirmation {
            client_secret: request.client_secret.expose().to_string(),
            card_token: request.card.token.clone(),
            billing: request.billing.clone(),
        });
        match state.script.pop_front() {
            None => Ok(PaymentConfirmation {
                status: PaymentIntentStatus::Succeeded,
                message: None,
            }),
            Some(ScriptedOutcome::Status(status, message)) => {
                Ok(PaymentConfirmation { status, message })
            }
            Some(ScriptedOutcome::Unavailable) => Err(PaymentError::Api {
                status: 503,
                message: "service unavailable".to_string(),
            }),
        }
    }
}
