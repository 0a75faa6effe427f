//! Domain types for the commerce gateway.
//!
//! These types provide a clean, ergonomic API separate from the raw wire
//! structs the HTTP client decodes (see `medusa::wire`). Every amount is an
//! integer count of minor units in the cart's currency.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use medusa_store_core::{
    CartId, CompletionKind, CurrencyCode, LineItemId, Money, OrderId, PaymentCollectionId,
    PaymentProviderId, PaymentSessionId, PaymentSessionStatus, ProductId, RegionId,
    ShippingOptionId, VariantId,
};

// =============================================================================
// Region & Totals
// =============================================================================

/// Currency and locale context of a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    /// Region ID.
    pub id: RegionId,
    /// Display name (e.g., "North America").
    pub name: String,
    /// Currency every amount in the cart is expressed in.
    pub currency_code: CurrencyCode,
}

/// Server-computed cart or order totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    /// Sum of line totals.
    pub subtotal: i64,
    /// Shipping cost of the attached shipping methods.
    pub shipping_total: i64,
    /// Tax computed by the backend.
    pub tax_total: i64,
    /// Grand total.
    pub total: i64,
}

// =============================================================================
// Line Items
// =============================================================================

/// One (variant, quantity) pairing within a cart or order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    /// Line item ID.
    pub id: LineItemId,
    /// Purchased variant.
    pub variant_id: VariantId,
    /// Display title.
    pub title: String,
    /// Variant title, if the product has options.
    pub variant_title: Option<String>,
    /// Thumbnail URL.
    pub thumbnail: Option<String>,
    /// Price of one unit.
    pub unit_price: i64,
    /// Quantity (always at least 1).
    pub quantity: u32,
    /// Line total as reported by the backend.
    pub line_total: i64,
}

// =============================================================================
// Addresses & Shipping
// =============================================================================

/// Structured postal address, in the backend's field naming.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub first_name: String,
    pub last_name: String,
    pub address_1: String,
    pub city: String,
    pub postal_code: String,
    /// Lowercase ISO 3166-1 alpha-2 code (e.g., "us").
    pub country_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// A shipping option available for a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingOption {
    /// Shipping option ID.
    pub id: ShippingOptionId,
    /// Display name (e.g., "Standard Shipping").
    pub name: String,
    /// Price in minor units.
    pub amount: i64,
}

/// A shipping option attached to a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingMethod {
    /// The option this method was created from.
    pub shipping_option_id: Option<ShippingOptionId>,
    /// Display name.
    pub name: String,
    /// Price in minor units.
    pub amount: i64,
}

// =============================================================================
// Payment Sessions
// =============================================================================

/// Provider-issued confirmation secret.
///
/// Implements `Debug` manually so the secret never lands in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientSecret(String);

impl ClientSecret {
    /// Wrap a secret value.
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Expose the raw secret. Do not log the result.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ClientSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ClientSecret([REDACTED])")
    }
}

/// A provider-scoped payment attempt on a cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentSession {
    /// Payment session ID.
    pub id: PaymentSessionId,
    /// Provider the session belongs to.
    pub provider_id: PaymentProviderId,
    /// Current status.
    pub status: PaymentSessionStatus,
    /// Confirmation secret, for providers that issue one.
    pub client_secret: Option<ClientSecret>,
}

/// Payment sub-resource of a cart.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaymentCollection {
    /// Payment collection ID.
    pub id: Option<PaymentCollectionId>,
    /// Sessions, in the order the backend returned them.
    pub payment_sessions: Vec<PaymentSession>,
}

// =============================================================================
// Cart
// =============================================================================

/// Authoritative mirror of one remote cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cart {
    /// Cart ID.
    pub id: CartId,
    /// Contact email, once checkout has attached one.
    pub email: Option<String>,
    /// Resolved region.
    pub region: Option<Region>,
    /// Currency of every amount in the cart.
    pub currency_code: CurrencyCode,
    /// Line items in display order.
    pub items: Vec<LineItem>,
    /// Server totals; `None` until the backend has reported them.
    pub totals: Option<Totals>,
    /// Shipping address attached at checkout.
    pub shipping_address: Option<Address>,
    /// Attached shipping methods.
    pub shipping_methods: Vec<ShippingMethod>,
    /// Payment sessions.
    pub payment_collection: Option<PaymentCollection>,
}

impl Cart {
    /// Whether the cart has no line items. An empty cart is a valid state.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Total quantity across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items
            .iter()
            .fold(0, |count: u32, item| count.saturating_add(item.quantity))
    }

    /// Pair an amount with the cart's currency for display.
    #[must_use]
    pub fn money(&self, amount: i64) -> Money {
        Money::new(amount, self.currency_code.clone())
    }

    /// Local subtotal estimate, for display only while `totals` is unknown.
    #[must_use]
    pub fn estimated_subtotal(&self) -> i64 {
        self.items.iter().fold(0, |sum: i64, item| {
            sum.saturating_add(item.unit_price.saturating_mul(i64::from(item.quantity)))
        })
    }

    /// Pending session for a provider, if one exists.
    #[must_use]
    pub fn pending_session(&self, provider_id: &PaymentProviderId) -> Option<&PaymentSession> {
        self.payment_collection.as_ref().and_then(|collection| {
            collection.payment_sessions.iter().find(|session| {
                &session.provider_id == provider_id
                    && session.status == PaymentSessionStatus::Pending
            })
        })
    }

    /// Confirmation secret of the provider's pending session, if non-empty.
    #[must_use]
    pub fn confirmation_secret(&self, provider_id: &PaymentProviderId) -> Option<&ClientSecret> {
        self.pending_session(provider_id)
            .and_then(|session| session.client_secret.as_ref())
            .filter(|secret| !secret.expose().trim().is_empty())
    }
}

/// Fields merged into a cart by a generic update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CartUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping_address: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billing_address: Option<Address>,
}

// =============================================================================
// Orders & Completion
// =============================================================================

/// Read-only projection of a placed order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    /// Order ID.
    pub id: OrderId,
    /// Human-friendly sequential number.
    pub display_id: Option<i64>,
    /// Contact email.
    pub email: Option<String>,
    /// Currency of every amount in the order.
    pub currency_code: CurrencyCode,
    /// Ordered lines.
    pub items: Vec<LineItem>,
    /// Order totals.
    pub totals: Option<Totals>,
    /// Placement time.
    pub created_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Label shown to the shopper (`display_id` when present).
    #[must_use]
    pub fn label(&self) -> String {
        self.display_id
            .map_or_else(|| self.id.to_string(), |n| format!("#{n}"))
    }
}

/// Tagged result of completing a cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// The cart became an order.
    Order(Order),
    /// The cart still requires action; carries the backend's reason.
    Cart {
        /// Cart as returned with the response.
        cart: Box<Cart>,
        /// Backend explanation, if any.
        message: Option<String>,
    },
}

impl Completion {
    /// Outcome kind tag.
    #[must_use]
    pub const fn kind(&self) -> CompletionKind {
        match self {
            Self::Order(_) => CompletionKind::Order,
            Self::Cart { .. } => CompletionKind::Cart,
        }
    }
}

// =============================================================================
// Products
// =============================================================================

/// A purchasable variant of a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductVariant {
    /// Variant ID (pass to `add_item`).
    pub id: VariantId,
    /// Variant title.
    pub title: String,
    /// Prices, one per currency.
    pub prices: Vec<Money>,
}

/// A product in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Product ID.
    pub id: ProductId,
    /// URL handle.
    pub handle: String,
    /// Product title.
    pub title: String,
    /// Plain text description.
    pub description: Option<String>,
    /// Thumbnail URL.
    pub thumbnail: Option<String>,
    /// Variants.
    pub variants: Vec<ProductVariant>,
}

impl Product {
    /// Price shown on listings: the first variant's first price.
    #[must_use]
    pub fn display_price(&self) -> Option<&Money> {
        self.variants.first().and_then(|v| v.prices.first())
    }
}

/// Filters for product listings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ProductQuery {
    /// Page size.
    pub limit: Option<u32>,
    /// Offset into the listing.
    pub offset: Option<u32>,
    /// Exact handle match.
    pub handle: Option<String>,
}

/// One page of products.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductPage {
    /// Products in this page.
    pub products: Vec<Product>,
    /// Total number of matching products.
    pub count: u64,
    /// Offset of this page.
    pub offset: u32,
    /// Page size used.
    pub limit: u32,
}
