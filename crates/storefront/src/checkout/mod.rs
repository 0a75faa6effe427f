//! Checkout orchestration.
//!
//! A three-step state machine (shipping → payment → review) over the cart
//! session. Each forward transition performs its remote side effects first
//! and only advances when they all succeed; on failure the step and the
//! draft are left exactly as they were.
//!
//! Payment settles according to the selected provider's capability:
//!
//! - [`ProviderCapability::ConfirmationRequired`]: the payment step creates a
//!   session carrying a client secret, and [`CheckoutOrchestrator::confirm_payment`]
//!   confirms it with the processor before completing the cart.
//! - [`ProviderCapability::DirectSettle`]: [`CheckoutOrchestrator::place_order`]
//!   initiates the session and completes the cart in one go.
//!
//! Once an order exists the cart session is cleared and the orchestrator is
//! closed; every further call returns [`CheckoutError::Closed`].

mod draft;
mod error;

pub use draft::{CheckoutDraft, DraftField, ShippingAddress};
pub use error::CheckoutError;

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use medusa_store_core::{OrderId, PaymentIntentStatus, PaymentProviderId, ShippingOptionId};

use crate::cart::CartSessionManager;
use crate::error::add_breadcrumb;
use crate::gateway::{Completion, ShippingOption};
use crate::payment::{BillingDetails, CardDetails, ConfirmPaymentRequest, PaymentConfirmer};
use crate::providers::{PaymentProvider, ProviderCapability, ProviderRegistry};

/// Where the shopper is in checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckoutStep {
    Shipping,
    Payment,
    Review,
}

impl fmt::Display for CheckoutStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Shipping => "shipping",
            Self::Payment => "payment",
            Self::Review => "review",
        })
    }
}

/// Drives one checkout over the active cart session.
pub struct CheckoutOrchestrator {
    cart: Arc<CartSessionManager>,
    confirmer: Arc<dyn PaymentConfirmer>,
    providers: ProviderRegistry,
    step: CheckoutStep,
    draft: CheckoutDraft,
    shipping_options: Vec<ShippingOption>,
    /// Set once the processor accepted the payment, so a failed completion
    /// can be retried without charging again.
    payment_confirmed: bool,
    order_id: Option<OrderId>,
}

impl fmt::Debug for CheckoutOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckoutOrchestrator")
            .field("step", &self.step)
            .field("draft", &self.draft)
            .field("shipping_options", &self.shipping_options)
            .field("payment_confirmed", &self.payment_confirmed)
            .field("order_id", &self.order_id)
            .finish_non_exhaustive()
    }
}

impl CheckoutOrchestrator {
    /// Start checkout on the Shipping step.
    ///
    /// Fetches the cart's shipping options and preselects the first. A failed
    /// fetch is logged and leaves the list empty; the shipping step then
    /// fails validation until options can be loaded.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::NoActiveCart`] if the session has no cart
    /// (call [`CartSessionManager::load`] first).
    #[instrument(skip_all)]
    pub async fn begin(
        cart: Arc<CartSessionManager>,
        confirmer: Arc<dyn PaymentConfirmer>,
        providers: ProviderRegistry,
    ) -> Result<Self, CheckoutError> {
        if cart.cart().is_none() {
            return Err(CheckoutError::NoActiveCart);
        }

        let draft = CheckoutDraft::new(providers.default_provider().clone());
        let mut checkout = Self {
            cart,
            confirmer,
            providers,
            step: CheckoutStep::Shipping,
            draft,
            shipping_options: Vec::new(),
            payment_confirmed: false,
            order_id: None,
        };
        checkout.load_shipping_options().await;

        add_breadcrumb("checkout", "Checkout started", None);
        Ok(checkout)
    }

    /// Re-fetch shipping options, keeping the selection if it is still offered.
    pub async fn load_shipping_options(&mut self) {
        match self.cart.shipping_options().await {
            Ok(options) => {
                let still_offered = self
                    .draft
                    .selected_shipping_option_id
                    .as_ref()
                    .is_some_and(|id| options.iter().any(|option| &option.id == id));
                if !still_offered {
                    self.draft.selected_shipping_option_id =
                        options.first().map(|option| option.id.clone());
                }
                self.shipping_options = options;
            }
            Err(e) => {
                warn!(error = %e, "Failed to fetch shipping options");
                self.shipping_options.clear();
            }
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Current step.
    #[must_use]
    pub const fn step(&self) -> CheckoutStep {
        self.step
    }

    /// Shopper input so far.
    #[must_use]
    pub const fn draft(&self) -> &CheckoutDraft {
        &self.draft
    }

    /// Edit shopper input. Edits stay local until a step is submitted.
    pub fn draft_mut(&mut self) -> &mut CheckoutDraft {
        &mut self.draft
    }

    /// Shipping options offered for the cart.
    #[must_use]
    pub fn shipping_options(&self) -> &[ShippingOption] {
        &self.shipping_options
    }

    /// Registered payment providers.
    #[must_use]
    pub const fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    /// The selected payment provider, if it is registered.
    #[must_use]
    pub fn payment_provider(&self) -> Option<&PaymentProvider> {
        self.providers.get(&self.draft.selected_payment_provider_id)
    }

    /// Billing details derived from the draft.
    #[must_use]
    pub fn billing_details(&self) -> BillingDetails {
        self.draft.billing_details()
    }

    /// The placed order, once checkout is closed.
    #[must_use]
    pub const fn order_id(&self) -> Option<&OrderId> {
        self.order_id.as_ref()
    }

    /// Whether an order was placed.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.order_id.is_some()
    }

    // =========================================================================
    // Selections
    // =========================================================================

    /// Choose a shipping option (Shipping step).
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::Validation`] if the option is not offered.
    pub fn select_shipping_option(&mut self, id: &ShippingOptionId) -> Result<(), CheckoutError> {
        self.expect_step(CheckoutStep::Shipping, "select a shipping option")?;
        if !self.shipping_options.iter().any(|option| &option.id == id) {
            return Err(CheckoutError::Validation(vec![DraftField::ShippingOption]));
        }
        self.draft.selected_shipping_option_id = Some(id.clone());
        Ok(())
    }

    /// Choose a payment provider (Payment step).
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::UnknownProvider`] for unregistered providers.
    pub fn select_payment_provider(&mut self, id: &PaymentProviderId) -> Result<(), CheckoutError> {
        self.expect_step(CheckoutStep::Payment, "select a payment provider")?;
        if self.providers.get(id).is_none() {
            return Err(CheckoutError::UnknownProvider(id.to_string()));
        }
        if &self.draft.selected_payment_provider_id != id {
            self.draft.selected_payment_provider_id = id.clone();
            self.payment_confirmed = false;
        }
        Ok(())
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// Submit the shipping step.
    ///
    /// Writes contact email and address (billing mirrors shipping), attaches
    /// the selected shipping method, refreshes the cart, then moves to
    /// Payment.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::Validation`] without any remote call if the
    /// draft is incomplete, or [`CheckoutError::Step`] if a remote call fails.
    #[instrument(skip(self))]
    pub async fn submit_shipping(&mut self) -> Result<(), CheckoutError> {
        self.expect_step(CheckoutStep::Shipping, "submit shipping")?;
        self.draft
            .validate(&self.shipping_options)
            .map_err(CheckoutError::Validation)?;
        let option_id = self
            .draft
            .selected_shipping_option_id
            .clone()
            .ok_or_else(|| CheckoutError::Validation(vec![DraftField::ShippingOption]))?;

        let step_failed = |reason: String| CheckoutError::Step {
            step: CheckoutStep::Shipping,
            reason,
        };

        self.cart
            .patch_cart(&self.draft.cart_update())
            .await
            .map_err(|e| step_failed(format!("Failed to update shipping information: {e}")))?;
        self.cart
            .add_shipping_method(&option_id)
            .await
            .map_err(|e| step_failed(format!("Failed to set shipping method: {e}")))?;
        self.cart
            .refresh()
            .await
            .map_err(|e| step_failed(format!("Failed to refresh cart: {e}")))?;

        self.advance(CheckoutStep::Payment);
        Ok(())
    }

    /// Submit the payment step.
    ///
    /// Confirmation-required providers get a payment session whose client
    /// secret must be present before Review, unless a payment with the same
    /// provider was already confirmed. Direct-settle providers move to
    /// Review with no remote call.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::Step`] if the session cannot be created or
    /// carries no usable secret.
    #[instrument(skip(self), fields(provider_id = %self.draft.selected_payment_provider_id))]
    pub async fn submit_payment(&mut self) -> Result<(), CheckoutError> {
        self.expect_step(CheckoutStep::Payment, "submit payment")?;
        let provider = self.selected_provider()?;

        if provider.capability == ProviderCapability::ConfirmationRequired && self.payment_confirmed
        {
            // Re-initiating would replace the session the processor already
            // accepted.
            debug!("Payment already confirmed, keeping the existing session");
        } else if provider.capability == ProviderCapability::ConfirmationRequired {
            let cart = self
                .cart
                .initiate_payment_session(&provider.id)
                .await
                .map_err(|e| CheckoutError::Step {
                    step: CheckoutStep::Payment,
                    reason: format!("Failed to initialize payment: {e}"),
                })?;
            if cart.confirmation_secret(&provider.id).is_none() {
                return Err(CheckoutError::Step {
                    step: CheckoutStep::Payment,
                    reason: "Payment session not initialized".to_string(),
                });
            }
        }

        self.advance(CheckoutStep::Review);
        Ok(())
    }

    /// Go back one step.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::InvalidTransition`] on the Shipping step.
    pub fn back(&mut self) -> Result<CheckoutStep, CheckoutError> {
        self.ensure_open()?;
        let previous = match self.step {
            CheckoutStep::Shipping => {
                return Err(CheckoutError::InvalidTransition {
                    step: self.step,
                    action: "go back",
                });
            }
            CheckoutStep::Payment => CheckoutStep::Shipping,
            CheckoutStep::Review => CheckoutStep::Payment,
        };
        self.advance(previous);
        Ok(previous)
    }

    /// Place the order with a direct-settle provider.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::Step`] if the session cannot be created and
    /// [`CheckoutError::OrderCompletionFailed`] if no order results.
    #[instrument(skip(self), fields(provider_id = %self.draft.selected_payment_provider_id))]
    pub async fn place_order(&mut self) -> Result<OrderId, CheckoutError> {
        self.expect_step(CheckoutStep::Review, "place the order")?;
        let provider = self.selected_provider()?;
        if provider.capability != ProviderCapability::DirectSettle {
            return Err(CheckoutError::InvalidTransition {
                step: self.step,
                action: "place the order without confirming payment",
            });
        }

        add_breadcrumb(
            "checkout",
            "Place order",
            Some(&[("provider_id", provider.id.as_str())]),
        );
        self.cart
            .initiate_payment_session(&provider.id)
            .await
            .map_err(|e| CheckoutError::Step {
                step: CheckoutStep::Review,
                reason: format!("Failed to initialize payment: {e}"),
            })?;

        self.complete().await
    }

    /// Confirm the card payment, then complete the order.
    ///
    /// If the processor already accepted the payment on an earlier attempt,
    /// only completion is retried.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::PaymentDeclined`],
    /// [`CheckoutError::PaymentActionRequired`], [`CheckoutError::Payment`]
    /// or [`CheckoutError::OrderCompletionFailed`]; the step stays Review.
    #[instrument(skip(self, card), fields(provider_id = %self.draft.selected_payment_provider_id))]
    pub async fn confirm_payment(&mut self, card: CardDetails) -> Result<OrderId, CheckoutError> {
        self.expect_step(CheckoutStep::Review, "confirm payment")?;
        let provider = self.selected_provider()?;
        if provider.capability != ProviderCapability::ConfirmationRequired {
            return Err(CheckoutError::InvalidTransition {
                step: self.step,
                action: "confirm a payment that needs no confirmation",
            });
        }

        if !self.payment_confirmed {
            let client_secret = self
                .cart
                .cart()
                .and_then(|cart| cart.confirmation_secret(&provider.id).cloned())
                .ok_or_else(|| CheckoutError::Step {
                    step: CheckoutStep::Review,
                    reason: "Payment session not initialized".to_string(),
                })?;

            add_breadcrumb(
                "checkout",
                "Confirm payment",
                Some(&[("provider_id", provider.id.as_str())]),
            );
            let request = ConfirmPaymentRequest {
                client_secret,
                card,
                billing: self.draft.billing_details(),
            };
            let confirmation = self.confirmer.confirm(&request).await?;

            match confirmation.status {
                PaymentIntentStatus::Succeeded | PaymentIntentStatus::RequiresCapture => {
                    self.payment_confirmed = true;
                }
                PaymentIntentStatus::RequiresAction => {
                    return Err(CheckoutError::PaymentActionRequired);
                }
                PaymentIntentStatus::Failed => {
                    warn!(message = ?confirmation.message, "Payment declined");
                    return Err(CheckoutError::PaymentDeclined {
                        message: confirmation
                            .message
                            .unwrap_or_else(|| "Your card was declined".to_string()),
                    });
                }
            }
        }

        self.complete().await
    }

    // =========================================================================
    // Internals
    // =========================================================================

    async fn complete(&mut self) -> Result<OrderId, CheckoutError> {
        match self.cart.complete().await {
            Ok(Completion::Order(order)) => {
                info!(order_id = %order.id, display_id = ?order.display_id, "Order placed");
                add_breadcrumb(
                    "checkout",
                    "Order placed",
                    Some(&[("order_id", order.id.as_str())]),
                );
                self.cart.clear();
                self.order_id = Some(order.id.clone());
                Ok(order.id)
            }
            Ok(Completion::Cart { message, .. }) => {
                warn!(message = ?message, "Cart completion did not produce an order");
                Err(CheckoutError::OrderCompletionFailed {
                    message: message
                        .unwrap_or_else(|| "The order could not be completed".to_string()),
                })
            }
            Err(e) => Err(CheckoutError::OrderCompletionFailed {
                message: e.to_string(),
            }),
        }
    }

    fn advance(&mut self, step: CheckoutStep) {
        let (from, to) = (self.step.to_string(), step.to_string());
        add_breadcrumb(
            "checkout",
            "Checkout step",
            Some(&[("from", from.as_str()), ("to", to.as_str())]),
        );
        self.step = step;
    }

    const fn ensure_open(&self) -> Result<(), CheckoutError> {
        if self.order_id.is_some() {
            Err(CheckoutError::Closed)
        } else {
            Ok(())
        }
    }

    fn expect_step(&self, step: CheckoutStep, action: &'static str) -> Result<(), CheckoutError> {
        self.ensure_open()?;
        if self.step == step {
            Ok(())
        } else {
            Err(CheckoutError::InvalidTransition {
                step: self.step,
                action,
            })
        }
    }

    fn selected_provider(&self) -> Result<PaymentProvider, CheckoutError> {
        self.payment_provider().cloned().ok_or_else(|| {
            CheckoutError::UnknownProvider(self.draft.selected_payment_provider_id.to_string())
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::gateway::mock::{CompletionMode, FailOn, MockFailure, MockGateway, MockOperation};
    use crate::payment::mock::{MockConfirmer, ScriptedOutcome};
    use crate::session_store::{MemorySessionStore, SessionStore};
    use medusa_store_core::VariantId;

    struct Harness {
        gateway: MockGateway,
        confirmer: MockConfirmer,
        store: Arc<MemorySessionStore>,
        manager: Arc<CartSessionManager>,
    }

    async fn harness() -> Harness {
        let gateway = MockGateway::new().with_variant("variant_1", "Tee", 2500);
        let store = Arc::new(MemorySessionStore::new());
        let manager = Arc::new(CartSessionManager::new(
            Arc::new(gateway.clone()),
            Arc::clone(&store) as Arc<dyn SessionStore>,
        ));
        manager
            .add_item(&VariantId::new("variant_1"), 1)
            .await
            .unwrap();
        Harness {
            gateway,
            confirmer: MockConfirmer::new(),
            store,
            manager,
        }
    }

    async fn begin(h: &Harness) -> CheckoutOrchestrator {
        CheckoutOrchestrator::begin(
            Arc::clone(&h.manager),
            Arc::new(h.confirmer.clone()),
            ProviderRegistry::default(),
        )
        .await
        .unwrap()
    }

    fn fill_draft(checkout: &mut CheckoutOrchestrator) {
        let draft = checkout.draft_mut();
        draft.contact_email = "ada@example.com".to_string();
        draft.shipping_address = ShippingAddress {
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            address_1: "1 Main St".to_string(),
            city: "Springfield".to_string(),
            postal_code: "12345".to_string(),
            ..ShippingAddress::default()
        };
    }

    async fn at_payment(h: &Harness) -> CheckoutOrchestrator {
        let mut checkout = begin(h).await;
        fill_draft(&mut checkout);
        checkout.submit_shipping().await.unwrap();
        checkout
    }

    fn stripe() -> PaymentProviderId {
        PaymentProviderId::new(PaymentProviderId::STRIPE)
    }

    #[tokio::test]
    async fn test_begin_without_cart() {
        let gateway = MockGateway::new();
        let manager = Arc::new(CartSessionManager::new(
            Arc::new(gateway),
            Arc::new(MemorySessionStore::new()),
        ));
        let result = CheckoutOrchestrator::begin(
            manager,
            Arc::new(MockConfirmer::new()),
            ProviderRegistry::default(),
        )
        .await;
        assert!(matches!(result, Err(CheckoutError::NoActiveCart)));
    }

    #[tokio::test]
    async fn test_begin_preselects_first_option() {
        let h = harness().await;
        let checkout = begin(&h).await;
        assert_eq!(checkout.step(), CheckoutStep::Shipping);
        assert_eq!(
            checkout.draft().selected_shipping_option_id,
            Some(ShippingOptionId::new("so_standard"))
        );
        assert_eq!(
            checkout.draft().selected_payment_provider_id.as_str(),
            PaymentProviderId::SYSTEM_DEFAULT
        );
    }

    #[tokio::test]
    async fn test_invalid_draft_makes_no_remote_call() {
        let h = harness().await;
        let mut checkout = begin(&h).await;
        h.gateway.clear_operations();

        let err = checkout.submit_shipping().await.unwrap_err();
        assert!(matches!(err, CheckoutError::Validation(ref f) if f.contains(&DraftField::ContactEmail)));
        assert_eq!(checkout.step(), CheckoutStep::Shipping);
        assert!(h.gateway.operations().is_empty());
    }

    #[tokio::test]
    async fn test_submit_shipping_writes_address_and_method() {
        let h = harness().await;
        let checkout = at_payment(&h).await;
        assert_eq!(checkout.step(), CheckoutStep::Payment);

        let cart = h.manager.cart().unwrap();
        assert_eq!(cart.email.as_deref(), Some("ada@example.com"));
        assert_eq!(cart.shipping_address.as_ref().unwrap().city, "Springfield");
        assert_eq!(cart.shipping_methods.len(), 1);
    }

    #[tokio::test]
    async fn test_shipping_failure_keeps_step_and_draft() {
        let h = harness().await;
        let mut checkout = begin(&h).await;
        fill_draft(&mut checkout);
        h.gateway
            .set_fail_on(Some(FailOn::AddShippingMethod(MockFailure::Unavailable)));

        let err = checkout.submit_shipping().await.unwrap_err();
        assert!(matches!(
            err,
            CheckoutError::Step {
                step: CheckoutStep::Shipping,
                ..
            }
        ));
        assert!(err.is_retryable());
        assert_eq!(checkout.step(), CheckoutStep::Shipping);
        assert_eq!(checkout.draft().contact_email, "ada@example.com");
    }

    #[tokio::test]
    async fn test_direct_settle_places_order() {
        let h = harness().await;
        let mut checkout = at_payment(&h).await;
        h.gateway.clear_operations();

        checkout.submit_payment().await.unwrap();
        assert_eq!(checkout.step(), CheckoutStep::Review);
        assert!(h.gateway.operations().is_empty());

        let order_id = checkout.place_order().await.unwrap();
        assert!(checkout.is_closed());
        assert_eq!(checkout.order_id(), Some(&order_id));
        assert!(h.manager.cart().is_none());
        assert!(h.store.get().unwrap().is_none());
        assert!(h.confirmer.calls().is_empty());
    }

    #[tokio::test]
    async fn test_card_payment_confirms_then_completes() {
        let h = harness().await;
        let mut checkout = at_payment(&h).await;
        checkout.select_payment_provider(&stripe()).unwrap();
        checkout.submit_payment().await.unwrap();
        assert_eq!(checkout.step(), CheckoutStep::Review);

        checkout
            .confirm_payment(CardDetails::token("tok_visa"))
            .await
            .unwrap();

        let calls = h.confirmer.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].client_secret.ends_with("_secret_mock"));
        assert_eq!(calls[0].billing.name, "Ada Lovelace");
        assert_eq!(calls[0].billing.address.country, "US");
        assert!(h.manager.cart().is_none());
    }

    #[tokio::test]
    async fn test_missing_secret_blocks_review() {
        let h = harness().await;
        let mut checkout = at_payment(&h).await;
        checkout.select_payment_provider(&stripe()).unwrap();
        h.gateway.set_issue_secrets(false);

        let err = checkout.submit_payment().await.unwrap_err();
        assert!(matches!(
            err,
            CheckoutError::Step { step: CheckoutStep::Payment, ref reason }
                if reason == "Payment session not initialized"
        ));
        assert_eq!(checkout.step(), CheckoutStep::Payment);
    }

    #[tokio::test]
    async fn test_declined_card_keeps_cart() {
        let h = harness().await;
        let mut checkout = at_payment(&h).await;
        checkout.select_payment_provider(&stripe()).unwrap();
        checkout.submit_payment().await.unwrap();
        h.confirmer.decline_next("Your card has insufficient funds.");

        let err = checkout
            .confirm_payment(CardDetails::token("tok_chargeDeclined"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CheckoutError::PaymentDeclined { ref message } if message == "Your card has insufficient funds."
        ));
        assert_eq!(checkout.step(), CheckoutStep::Review);
        assert!(h.manager.cart().is_some());
        assert!(
            !h.gateway
                .operations()
                .iter()
                .any(|op| matches!(op, MockOperation::CompleteCart { .. }))
        );
    }

    #[tokio::test]
    async fn test_requires_action_is_reported() {
        let h = harness().await;
        let mut checkout = at_payment(&h).await;
        checkout.select_payment_provider(&stripe()).unwrap();
        checkout.submit_payment().await.unwrap();
        h.confirmer.push(ScriptedOutcome::Status(
            PaymentIntentStatus::RequiresAction,
            None,
        ));

        let err = checkout
            .confirm_payment(CardDetails::token("tok_threeDSecure"))
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::PaymentActionRequired));
        assert!(h.manager.cart().is_some());
    }

    #[tokio::test]
    async fn test_failed_completion_retries_without_recharging() {
        let h = harness().await;
        let mut checkout = at_payment(&h).await;
        checkout.select_payment_provider(&stripe()).unwrap();
        checkout.submit_payment().await.unwrap();
        h.gateway
            .set_completion_mode(CompletionMode::RequireAction("Payment not authorized".into()));

        let err = checkout
            .confirm_payment(CardDetails::token("tok_visa"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CheckoutError::OrderCompletionFailed { ref message } if message == "Payment not authorized"
        ));
        assert_eq!(checkout.step(), CheckoutStep::Review);
        assert!(h.manager.cart().is_some());
        assert!(h.store.get().unwrap().is_some());

        h.gateway.set_completion_mode(CompletionMode::Normal);
        checkout
            .confirm_payment(CardDetails::token("tok_visa"))
            .await
            .unwrap();
        assert_eq!(h.confirmer.calls().len(), 1);
        assert!(checkout.is_closed());
    }

    #[tokio::test]
    async fn test_confirmed_payment_survives_going_back() {
        let h = harness().await;
        let mut checkout = at_payment(&h).await;
        checkout.select_payment_provider(&stripe()).unwrap();
        checkout.submit_payment().await.unwrap();
        h.gateway
            .set_completion_mode(CompletionMode::RequireAction("Payment not authorized".into()));
        checkout
            .confirm_payment(CardDetails::token("tok_visa"))
            .await
            .unwrap_err();

        assert_eq!(checkout.back().unwrap(), CheckoutStep::Payment);
        h.gateway.clear_operations();
        checkout.submit_payment().await.unwrap();
        assert_eq!(checkout.step(), CheckoutStep::Review);
        assert!(
            !h.gateway
                .operations()
                .iter()
                .any(|op| matches!(op, MockOperation::InitiatePaymentSession { .. }))
        );

        h.gateway.set_completion_mode(CompletionMode::Normal);
        checkout
            .confirm_payment(CardDetails::token("tok_visa"))
            .await
            .unwrap();
        assert_eq!(h.confirmer.calls().len(), 1);
        assert!(checkout.is_closed());
    }

    #[tokio::test]
    async fn test_changing_provider_after_confirmation_starts_over() {
        let h = harness().await;
        let mut checkout = at_payment(&h).await;
        checkout.select_payment_provider(&stripe()).unwrap();
        checkout.submit_payment().await.unwrap();
        h.gateway
            .set_completion_mode(CompletionMode::RequireAction("Payment not authorized".into()));
        checkout
            .confirm_payment(CardDetails::token("tok_visa"))
            .await
            .unwrap_err();

        checkout.back().unwrap();
        let manual = PaymentProviderId::new(PaymentProviderId::SYSTEM_DEFAULT);
        checkout.select_payment_provider(&manual).unwrap();
        checkout.select_payment_provider(&stripe()).unwrap();
        h.gateway.clear_operations();
        checkout.submit_payment().await.unwrap();
        assert!(
            h.gateway
                .operations()
                .iter()
                .any(|op| matches!(op, MockOperation::InitiatePaymentSession { .. }))
        );
    }

    #[tokio::test]
    async fn test_closed_checkout_rejects_everything() {
        let h = harness().await;
        let mut checkout = at_payment(&h).await;
        checkout.submit_payment().await.unwrap();
        checkout.place_order().await.unwrap();

        assert!(matches!(checkout.back(), Err(CheckoutError::Closed)));
        assert!(matches!(
            checkout.place_order().await,
            Err(CheckoutError::Closed)
        ));
        assert!(matches!(
            checkout.submit_shipping().await,
            Err(CheckoutError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_back_and_unknown_provider() {
        let h = harness().await;
        let mut checkout = at_payment(&h).await;

        assert!(matches!(
            checkout.select_payment_provider(&PaymentProviderId::new("pp_paypal")),
            Err(CheckoutError::UnknownProvider(_))
        ));
        assert_eq!(checkout.back().unwrap(), CheckoutStep::Shipping);
        assert!(matches!(
            checkout.back(),
            Err(CheckoutError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_confirm_payment_rejected_for_direct_settle() {
        let h = harness().await;
        let mut checkout = at_payment(&h).await;
        checkout.submit_payment().await.unwrap();
        assert!(matches!(
            checkout.confirm_payment(CardDetails::token("tok_visa")).await,
            Err(CheckoutError::InvalidTransition { .. })
        ));
    }
}
