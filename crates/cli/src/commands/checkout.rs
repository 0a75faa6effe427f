//! Non-interactive checkout.
//!
//! Runs Shipping → Payment → Review → completion from command-line flags.
//! A card token is required when the chosen provider confirms payments
//! client-side.

use std::sync::Arc;

use async_trait::async_trait;
use clap::Args;

use medusa_store_core::{PaymentProviderId, ShippingOptionId};
use medusa_store_storefront::cart::CartError;
use medusa_store_storefront::checkout::{
    CheckoutError, CheckoutOrchestrator, CheckoutStep, ShippingAddress,
};
use medusa_store_storefront::config::StorefrontConfig;
use medusa_store_storefront::error::StorefrontError;
use medusa_store_storefront::payment::{
    CardDetails, ConfirmPaymentRequest, PaymentConfirmation, PaymentConfirmer, PaymentError,
    StripeConfirmer,
};
use medusa_store_storefront::providers::{ProviderCapability, ProviderRegistry};

use super::{Storefront, print};
use crate::render;

/// Checkout flags.
#[derive(Debug, Args)]
pub struct CheckoutArgs {
    /// Contact email
    #[arg(long)]
    pub email: String,

    /// First name
    #[arg(long)]
    pub first_name: String,

    /// Last name
    #[arg(long)]
    pub last_name: String,

    /// Street address
    #[arg(long)]
    pub address: String,

    /// City
    #[arg(long)]
    pub city: String,

    /// Postal code
    #[arg(long)]
    pub postal_code: String,

    /// Two-letter country code
    #[arg(long, default_value = "us")]
    pub country: String,

    /// Phone number
    #[arg(long)]
    pub phone: Option<String>,

    /// Shipping option id (defaults to the first offered)
    #[arg(long)]
    pub shipping_option: Option<String>,

    /// Payment provider id (defaults to the manual test provider)
    #[arg(long)]
    pub provider: Option<String>,

    /// Card token for card payments (e.g., `tok_visa`)
    #[arg(long)]
    pub card_token: Option<String>,
}

/// Stands in when no card processor is configured; every confirmation fails.
struct UnconfiguredConfirmer;

#[async_trait]
impl PaymentConfirmer for UnconfiguredConfirmer {
    async fn confirm(
        &self,
        _request: &ConfirmPaymentRequest,
    ) -> Result<PaymentConfirmation, PaymentError> {
        Err(PaymentError::NotConfigured)
    }
}

/// The configured card processor, or one that reports it is missing.
pub fn confirmer(config: &StorefrontConfig) -> Arc<dyn PaymentConfirmer> {
    match StripeConfirmer::new(&config.stripe) {
        Ok(stripe) => Arc::new(stripe),
        Err(e) => {
            tracing::debug!(error = %e, "Card payments unavailable");
            Arc::new(UnconfiguredConfirmer)
        }
    }
}

/// How the order gets paid.
#[derive(Debug, PartialEq, Eq)]
enum PaymentPlan {
    Card(CardDetails),
    DirectSettle,
}

/// Resolve the provider and its payment input from the flags alone.
fn plan_payment(
    providers: &ProviderRegistry,
    provider_id: &PaymentProviderId,
    card_token: Option<String>,
) -> Result<PaymentPlan, CheckoutError> {
    let provider = providers
        .get(provider_id)
        .ok_or_else(|| CheckoutError::UnknownProvider(provider_id.to_string()))?;
    match provider.capability {
        ProviderCapability::ConfirmationRequired => card_token
            .map(|token| PaymentPlan::Card(CardDetails::token(token)))
            .ok_or_else(|| CheckoutError::Step {
                step: CheckoutStep::Payment,
                reason: "A card token is required for card payments".to_string(),
            }),
        ProviderCapability::DirectSettle => Ok(PaymentPlan::DirectSettle),
    }
}

/// Run checkout to completion and print the order.
///
/// Flags are checked before the backend is contacted.
///
/// # Errors
///
/// Returns the first checkout error; the cart is kept so the command can be
/// re-run.
pub async fn run(
    store: &Storefront,
    confirmer: Arc<dyn PaymentConfirmer>,
    args: CheckoutArgs,
) -> Result<(), StorefrontError> {
    let providers = ProviderRegistry::default();
    let provider_id = args.provider.as_deref().map_or_else(
        || providers.default_provider().clone(),
        PaymentProviderId::new,
    );
    let plan = plan_payment(&providers, &provider_id, args.card_token)?;

    if store.cart.load().await.is_none() {
        return Err(CartError::NoActiveCart.into());
    }

    let mut checkout =
        CheckoutOrchestrator::begin(Arc::clone(&store.cart), confirmer, providers).await?;

    let draft = checkout.draft_mut();
    draft.contact_email = args.email;
    draft.shipping_address = ShippingAddress {
        first_name: args.first_name,
        last_name: args.last_name,
        address_1: args.address,
        city: args.city,
        postal_code: args.postal_code,
        country_code: args.country,
        phone: args.phone.unwrap_or_default(),
    };
    if let Some(option) = &args.shipping_option {
        checkout.select_shipping_option(&ShippingOptionId::new(option.as_str()))?;
    }
    checkout.submit_shipping().await?;

    checkout.select_payment_provider(&provider_id)?;
    checkout.submit_payment().await?;

    let order_id = match plan {
        PaymentPlan::Card(card) => checkout.confirm_payment(card).await?,
        PaymentPlan::DirectSettle => checkout.place_order().await?,
    };

    match store.catalog.order(&order_id).await {
        Ok(order) => print(&render::order(&order)),
        Err(e) => {
            tracing::warn!(order_id = %order_id, error = %e, "Placed order could not be fetched");
            print(&format!("Order placed: {order_id}"));
        }
    }
    Ok(())
}
