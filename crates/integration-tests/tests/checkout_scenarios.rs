//! Cart session and checkout flows end to end.
//!
//! The commerce backend is the in-memory mock gateway; sessions persist
//! through the file store in a temporary directory, so a second manager over
//! the same file behaves like a later run of the app.

use std::sync::Arc;

use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use medusa_store_core::{LineItemId, PaymentProviderId, VariantId};
use medusa_store_integration_tests::{manager, stripe_config};
use medusa_store_storefront::cart::{CartError, CartSessionManager};
use medusa_store_storefront::checkout::{
    CheckoutError, CheckoutOrchestrator, CheckoutStep, ShippingAddress,
};
use medusa_store_storefront::gateway::mock::{CompletionMode, MockGateway, MockOperation};
use medusa_store_storefront::payment::mock::MockConfirmer;
use medusa_store_storefront::payment::{CardDetails, PaymentConfirmer, StripeConfirmer};
use medusa_store_storefront::providers::ProviderRegistry;
use medusa_store_storefront::session_store::{FileSessionStore, SessionStore};

struct Shop {
    gateway: MockGateway,
    dir: TempDir,
}

impl Shop {
    fn new() -> Self {
        Self {
            gateway: MockGateway::new()
                .with_variant("variant_tee", "Classic Tee", 500)
                .with_variant("variant_mug", "Mug", 1200),
            dir: TempDir::new().unwrap(),
        }
    }

    fn store(&self) -> Arc<FileSessionStore> {
        Arc::new(FileSessionStore::with_path(self.dir.path().join("cart.json")))
    }

    /// A fresh manager over the shared session file.
    fn session(&self) -> Arc<CartSessionManager> {
        manager(&self.gateway, self.store())
    }
}

fn tee() -> VariantId {
    VariantId::new("variant_tee")
}

fn stripe() -> PaymentProviderId {
    PaymentProviderId::new(PaymentProviderId::STRIPE)
}

async fn begin(
    cart: &Arc<CartSessionManager>,
    confirmer: Arc<dyn PaymentConfirmer>,
) -> CheckoutOrchestrator {
    CheckoutOrchestrator::begin(Arc::clone(cart), confirmer, ProviderRegistry::default())
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

fn completions(gateway: &MockGateway) -> usize {
    gateway
        .operations()
        .iter()
        .filter(|op| matches!(op, MockOperation::CompleteCart { .. }))
        .count()
}

// =============================================================================
// Cart session
// =============================================================================

#[tokio::test]
async fn test_first_add_creates_and_persists_session() {
    let shop = Shop::new();
    let cart = shop.session();
    assert!(cart.load().await.is_none());

    let created = cart.add_item(&tee(), 2).await.unwrap();
    assert_eq!(shop.store().get().unwrap(), Some(created.id.clone()));

    let line = created.items.first().unwrap();
    assert_eq!(line.unit_price, 500);
    assert_eq!(line.line_total, 1000);
    assert_eq!(created.totals.unwrap().subtotal, 1000);

    // A later run picks the same cart up from disk.
    let later = shop.session();
    let reloaded = later.load().await.unwrap();
    assert_eq!(reloaded, created);
    assert_eq!(later.item_count(), 2);
}

#[tokio::test]
async fn test_local_cart_is_last_backend_response() {
    let shop = Shop::new();
    let cart = shop.session();

    cart.add_item(&tee(), 1).await.unwrap();
    let with_mug = cart.add_item(&VariantId::new("variant_mug"), 1).await.unwrap();
    let tee_line = with_mug
        .items
        .iter()
        .find(|item| item.variant_id == tee())
        .unwrap()
        .id
        .clone();
    cart.set_item_quantity(&tee_line, 3).await.unwrap();
    let last = cart.remove_item(&tee_line).await.unwrap();

    assert_eq!(cart.cart(), Some(last.clone()));
    assert_eq!(shop.gateway.cart(&last.id), Some(last.clone()));
    assert_eq!(last.totals.unwrap().subtotal, 1200);
}

#[tokio::test]
async fn test_zero_quantity_stays_local() {
    let shop = Shop::new();
    let cart = shop.session();
    let created = cart.add_item(&tee(), 1).await.unwrap();
    let line_id = created.items.first().unwrap().id.clone();
    shop.gateway.clear_operations();

    assert_eq!(cart.set_item_quantity(&line_id, 0).await.unwrap(), None);
    assert!(shop.gateway.operations().is_empty());
    assert_eq!(cart.cart(), Some(created));
}

#[tokio::test]
async fn test_stale_session_file_starts_fresh() {
    let shop = Shop::new();
    let cart = shop.session();
    cart.add_item(&tee(), 1).await.unwrap();

    // The backend forgets the cart (e.g., it was purged) between runs.
    let other = Shop {
        gateway: MockGateway::new().with_variant("variant_tee", "Classic Tee", 500),
        dir: shop.dir,
    };
    let later = other.session();
    assert!(later.load().await.is_none());
    assert!(other.store().get().unwrap().is_none());

    let err = later
        .set_item_quantity(&LineItemId::new("item_1"), 2)
        .await
        .unwrap_err();
    assert!(matches!(err, CartError::NoActiveCart));
}

// =============================================================================
// Checkout
// =============================================================================

#[tokio::test]
async fn test_incomplete_draft_stays_on_shipping() {
    let shop = Shop::new();
    let cart = shop.session();
    cart.add_item(&tee(), 1).await.unwrap();
    let mut checkout = begin(&cart, Arc::new(MockConfirmer::new())).await;
    shop.gateway.clear_operations();

    checkout.draft_mut().contact_email = "ada@example.com".to_string();
    let err = checkout.submit_shipping().await.unwrap_err();

    assert!(matches!(err, CheckoutError::Validation(ref fields) if fields.len() == 5));
    assert_eq!(checkout.step(), CheckoutStep::Shipping);
    assert!(shop.gateway.operations().is_empty());
}

#[tokio::test]
async fn test_direct_settle_checkout_end_to_end() {
    let shop = Shop::new();
    let cart = shop.session();
    cart.add_item(&tee(), 2).await.unwrap();

    let mut checkout = begin(&cart, Arc::new(MockConfirmer::new())).await;
    fill_draft(&mut checkout);
    checkout.submit_shipping().await.unwrap();
    assert_eq!(checkout.step(), CheckoutStep::Payment);

    shop.gateway.clear_operations();
    checkout.submit_payment().await.unwrap();
    assert_eq!(checkout.step(), CheckoutStep::Review);
    assert!(shop.gateway.operations().is_empty());

    let cart_id = cart.cart().unwrap().id;
    let order_id = checkout.place_order().await.unwrap();
    assert!(checkout.is_closed());
    assert_eq!(checkout.order_id(), Some(&order_id));
    assert!(cart.cart().is_none());
    assert!(shop.store().get().unwrap().is_none());

    let operations = shop.gateway.operations();
    assert_eq!(
        operations.first(),
        Some(&MockOperation::InitiatePaymentSession {
            cart_id: cart_id.clone(),
            provider_id: PaymentProviderId::new(PaymentProviderId::SYSTEM_DEFAULT),
        })
    );
    assert_eq!(operations.last(), Some(&MockOperation::CompleteCart { cart_id }));
}

#[tokio::test]
async fn test_missing_secret_is_a_payment_step_error() {
    let shop = Shop::new();
    let cart = shop.session();
    cart.add_item(&tee(), 1).await.unwrap();
    let mut checkout = begin(&cart, Arc::new(MockConfirmer::new())).await;
    fill_draft(&mut checkout);
    checkout.submit_shipping().await.unwrap();
    checkout.select_payment_provider(&stripe()).unwrap();
    shop.gateway.set_issue_secrets(false);

    let err = checkout.submit_payment().await.unwrap_err();
    assert!(matches!(err, CheckoutError::Step { step: CheckoutStep::Payment, .. }));
    assert!(err.is_retryable());
    assert_eq!(checkout.step(), CheckoutStep::Payment);
}

#[tokio::test]
async fn test_declined_card_then_retry_places_order() {
    let shop = Shop::new();
    let cart = shop.session();
    cart.add_item(&tee(), 1).await.unwrap();
    let confirmer = MockConfirmer::new();
    let mut checkout = begin(&cart, Arc::new(confirmer.clone())).await;
    fill_draft(&mut checkout);
    checkout.submit_shipping().await.unwrap();
    checkout.select_payment_provider(&stripe()).unwrap();
    checkout.submit_payment().await.unwrap();

    confirmer.decline_next("Your card was declined.");
    let err = checkout
        .confirm_payment(CardDetails::token("tok_chargeDeclined"))
        .await
        .unwrap_err();
    assert!(matches!(err, CheckoutError::PaymentDeclined { .. }));
    assert_eq!(checkout.step(), CheckoutStep::Review);
    assert!(cart.cart().is_some());
    assert_eq!(completions(&shop.gateway), 0);

    checkout
        .confirm_payment(CardDetails::token("tok_visa"))
        .await
        .unwrap();
    assert_eq!(confirmer.calls().len(), 2);
    assert_eq!(completions(&shop.gateway), 1);
    assert!(cart.cart().is_none());
}

#[tokio::test]
async fn test_refused_completion_keeps_cart() {
    let shop = Shop::new();
    let cart = shop.session();
    cart.add_item(&tee(), 1).await.unwrap();
    let mut checkout = begin(&cart, Arc::new(MockConfirmer::new())).await;
    fill_draft(&mut checkout);
    checkout.submit_shipping().await.unwrap();
    checkout.submit_payment().await.unwrap();
    shop.gateway
        .set_completion_mode(CompletionMode::RequireAction("Inventory changed".to_string()));

    let err = checkout.place_order().await.unwrap_err();
    assert!(matches!(
        err,
        CheckoutError::OrderCompletionFailed { ref message } if message == "Inventory changed"
    ));
    assert!(!checkout.is_closed());
    assert!(cart.cart().is_some());
    assert!(shop.store().get().unwrap().is_some());
}

#[tokio::test]
async fn test_card_checkout_through_stripe() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path_regex(r"^/v1/payment_intents/pi_ps_\d+/confirm$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "succeeded" })))
        .expect(1)
        .mount(&server)
        .await;
    let confirmer = StripeConfirmer::new(&stripe_config(&server)).unwrap();

    let shop = Shop::new();
    let cart = shop.session();
    cart.add_item(&tee(), 1).await.unwrap();
    let mut checkout = begin(&cart, Arc::new(confirmer)).await;
    fill_draft(&mut checkout);
    checkout.submit_shipping().await.unwrap();
    checkout.select_payment_provider(&stripe()).unwrap();
    checkout.submit_payment().await.unwrap();

    let order_id = checkout
        .confirm_payment(CardDetails::token("tok_visa"))
        .await
        .unwrap();
    assert_eq!(checkout.order_id(), Some(&order_id));
    assert!(shop.store().get().unwrap().is_none());
}
