//! Integration tests for Medusa Store.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p medusa-store-integration-tests
//! ```
//!
//! No external services are needed: `wiremock` servers stand in for the
//! Medusa store API and Stripe, and end-to-end scenarios run against the
//! in-memory mock gateway.
//!
//! # Test Categories
//!
//! - `medusa_client` - store API requests, decoding, retries
//! - `stripe_confirmer` - payment intent confirmation
//! - `checkout_scenarios` - cart session and checkout flows end to end

use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;
use serde_json::{Value, json};
use url::Url;
use wiremock::MockServer;

use medusa_store_storefront::cart::CartSessionManager;
use medusa_store_storefront::config::{MedusaConfig, StripeConfig};
use medusa_store_storefront::gateway::mock::MockGateway;
use medusa_store_storefront::session_store::SessionStore;

/// Publishable key sent to the mock store API.
pub const MEDUSA_KEY: &str = "pk_medusa_integration";

/// Publishable key sent to the mock Stripe API.
pub const STRIPE_KEY: &str = "pk_test_integration";

fn server_url(server: &MockServer) -> Url {
    Url::parse(&server.uri()).expect("mock server uri is a valid URL")
}

/// Store API config pointing at a mock server, with fast retries.
#[must_use]
pub fn medusa_config(server: &MockServer) -> MedusaConfig {
    let mut config = MedusaConfig::new(server_url(server));
    config.publishable_key = Some(SecretString::from(MEDUSA_KEY.to_string()));
    config.retry_backoff = Duration::from_millis(5);
    config
}

/// Stripe config pointing at a mock server.
#[must_use]
pub fn stripe_config(server: &MockServer) -> StripeConfig {
    StripeConfig::new(server_url(server), STRIPE_KEY)
}

/// A store API cart body with one line and backend totals.
#[must_use]
pub fn cart_json(id: &str) -> Value {
    json!({
        "id": id,
        "email": null,
        "region": { "id": "reg_us", "name": "United States", "currency_code": "usd" },
        "items": [{
            "id": "item_1",
            "variant_id": "variant_1",
            "title": "Classic Tee",
            "variant_title": "Large",
            "unit_price": 500,
            "quantity": 2,
            "total": 1000
        }],
        "subtotal": 1000,
        "shipping_total": 0,
        "tax_total": 80,
        "total": 1080,
        "shipping_methods": [],
        "payment_collection": null
    })
}

/// A store API cart body with a pending Stripe session.
#[must_use]
pub fn cart_with_session_json(id: &str, client_secret: &str) -> Value {
    let mut cart = cart_json(id);
    cart["payment_collection"] = json!({
        "id": "paycol_1",
        "payment_sessions": [{
            "id": "payses_1",
            "provider_id": "pp_stripe_stripe",
            "status": "pending",
            "data": { "client_secret": client_secret }
        }]
    });
    cart
}

/// A store API order body.
#[must_use]
pub fn order_json(id: &str) -> Value {
    json!({
        "id": id,
        "display_id": 1001,
        "email": "ada@example.com",
        "currency_code": "usd",
        "items": cart_json("cart_done")["items"].clone(),
        "subtotal": 1000,
        "shipping_total": 500,
        "tax_total": 0,
        "total": 1500,
        "created_at": "2026-01-15T12:00:00Z"
    })
}

/// A cart session manager over a mock gateway and the given store.
#[must_use]
pub fn manager(gateway: &MockGateway, store: Arc<dyn SessionStore>) -> Arc<CartSessionManager> {
    Arc::new(CartSessionManager::new(Arc::new(gateway.clone()), store))
}
