//! Medusa store API wire types and their conversion into domain types.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::warn;

use medusa_store_core::{
    CartId, CurrencyCode, LineItemId, Money, OrderId, PaymentCollectionId, PaymentProviderId,
    PaymentSessionId, PaymentSessionStatus, ProductId, RegionId, ShippingOptionId, VariantId,
};

use crate::gateway::types::{
    Address, Cart, ClientSecret, Completion, LineItem, Order, PaymentCollection, PaymentSession,
    Product, ProductPage, ProductVariant, Region, ShippingMethod, ShippingOption, Totals,
};

/// Parse a currency code, falling back to USD like the storefront always has.
fn currency_or_default(code: Option<&str>) -> CurrencyCode {
    match code.map(str::parse::<CurrencyCode>) {
        Some(Ok(currency)) => currency,
        Some(Err(e)) => {
            warn!(error = %e, "Unrecognized currency code, falling back to USD");
            CurrencyCode::default()
        }
        None => CurrencyCode::default(),
    }
}

fn totals_from(
    subtotal: Option<i64>,
    shipping_total: Option<i64>,
    tax_total: Option<i64>,
    total: Option<i64>,
) -> Option<Totals> {
    Some(Totals {
        subtotal: subtotal?,
        shipping_total: shipping_total.unwrap_or(0),
        tax_total: tax_total.unwrap_or(0),
        total: total?,
    })
}

// =============================================================================
// Envelopes
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct CartEnvelope {
    pub cart: CartWire,
}

/// Line item deletion answers with the parent cart; older servers say `cart`.
#[derive(Debug, Deserialize)]
pub struct DeleteEnvelope {
    #[serde(alias = "cart")]
    pub parent: CartWire,
}

#[derive(Debug, Deserialize)]
pub struct ShippingOptionsEnvelope {
    #[serde(default)]
    pub shipping_options: Vec<ShippingOptionWire>,
}

#[derive(Debug, Deserialize)]
pub struct ProductEnvelope {
    pub product: ProductWire,
}

#[derive(Debug, Deserialize)]
pub struct ProductsEnvelope {
    #[serde(default)]
    pub products: Vec<ProductWire>,
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub offset: u32,
    #[serde(default)]
    pub limit: u32,
}

#[derive(Debug, Deserialize)]
pub struct OrderEnvelope {
    pub order: OrderWire,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CompletionEnvelope {
    Order {
        order: OrderWire,
    },
    Cart {
        cart: CartWire,
        #[serde(default)]
        error: Option<serde_json::Value>,
    },
}

/// Error body shape used by the backend.
#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    pub message: Option<String>,
}

// =============================================================================
// Cart
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct CartWire {
    pub id: String,
    pub email: Option<String>,
    pub region_id: Option<String>,
    pub region: Option<RegionWire>,
    pub currency_code: Option<String>,
    pub items: Option<Vec<LineItemWire>>,
    pub subtotal: Option<i64>,
    pub shipping_total: Option<i64>,
    pub tax_total: Option<i64>,
    pub total: Option<i64>,
    pub shipping_address: Option<AddressWire>,
    pub shipping_methods: Option<Vec<ShippingMethodWire>>,
    pub payment_collection: Option<PaymentCollectionWire>,
}

#[derive(Debug, Deserialize)]
pub struct RegionWire {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub currency_code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LineItemWire {
    pub id: String,
    pub variant_id: Option<String>,
    #[serde(default)]
    pub title: String,
    pub variant_title: Option<String>,
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub unit_price: i64,
    #[serde(default)]
    pub quantity: u32,
    pub total: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct AddressWire {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub address_1: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub country_code: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ShippingMethodWire {
    pub shipping_option_id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub amount: i64,
}

#[derive(Debug, Deserialize)]
pub struct PaymentCollectionWire {
    pub id: Option<String>,
    pub payment_sessions: Option<Vec<PaymentSessionWire>>,
}

#[derive(Debug, Deserialize)]
pub struct PaymentSessionWire {
    pub id: String,
    pub provider_id: String,
    #[serde(default)]
    pub status: PaymentSessionStatus,
    pub data: Option<serde_json::Value>,
}

impl From<LineItemWire> for LineItem {
    fn from(item: LineItemWire) -> Self {
        let line_total = item.total.unwrap_or_else(|| {
            item.unit_price
                .checked_mul(i64::from(item.quantity))
                .unwrap_or_else(|| {
                    warn!(
                        line_id = %item.id,
                        unit_price = item.unit_price,
                        quantity = item.quantity,
                        "Line total out of range, saturating"
                    );
                    item.unit_price.saturating_mul(i64::from(item.quantity))
                })
        });
        Self {
            id: LineItemId::new(item.id),
            variant_id: VariantId::new(item.variant_id.unwrap_or_default()),
            title: item.title,
            variant_title: item.variant_title,
            thumbnail: item.thumbnail,
            unit_price: item.unit_price,
            quantity: item.quantity,
            line_total,
        }
    }
}

impl From<AddressWire> for Address {
    fn from(a: AddressWire) -> Self {
        Self {
            first_name: a.first_name.unwrap_or_default(),
            last_name: a.last_name.unwrap_or_default(),
            address_1: a.address_1.unwrap_or_default(),
            city: a.city.unwrap_or_default(),
            postal_code: a.postal_code.unwrap_or_default(),
            country_code: a.country_code.unwrap_or_default(),
            phone: a.phone,
        }
    }
}

impl From<PaymentSessionWire> for PaymentSession {
    fn from(session: PaymentSessionWire) -> Self {
        let client_secret = session
            .data
            .as_ref()
            .and_then(|data| data.get("client_secret"))
            .and_then(serde_json::Value::as_str)
            .filter(|secret| !secret.is_empty())
            .map(ClientSecret::new);
        Self {
            id: PaymentSessionId::new(session.id),
            provider_id: PaymentProviderId::new(session.provider_id),
            status: session.status,
            client_secret,
        }
    }
}

impl From<CartWire> for Cart {
    fn from(cart: CartWire) -> Self {
        let region_currency = cart
            .region
            .as_ref()
            .and_then(|r| r.currency_code.as_deref());
        let currency_code = currency_or_default(region_currency.or(cart.currency_code.as_deref()));

        let region = cart.region.map(|r| Region {
            id: RegionId::new(r.id),
            name: r.name,
            currency_code: currency_code.clone(),
        });
        let region = region.or_else(|| {
            cart.region_id.map(|id| Region {
                id: RegionId::new(id),
                name: String::new(),
                currency_code: currency_code.clone(),
            })
        });

        Self {
            id: CartId::new(cart.id),
            email: cart.email,
            region,
            currency_code,
            items: cart
                .items
                .unwrap_or_default()
                .into_iter()
                .map(LineItem::from)
                .collect(),
            totals: totals_from(
                cart.subtotal,
                cart.shipping_total,
                cart.tax_total,
                cart.total,
            ),
            shipping_address: cart.shipping_address.map(Address::from),
            shipping_methods: cart
                .shipping_methods
                .unwrap_or_default()
                .into_iter()
                .map(|m| ShippingMethod {
                    shipping_option_id: m.shipping_option_id.map(ShippingOptionId::new),
                    name: m.name,
                    amount: m.amount,
                })
                .collect(),
            payment_collection: cart.payment_collection.map(|pc| PaymentCollection {
                id: pc.id.map(PaymentCollectionId::new),
                payment_sessions: pc
                    .payment_sessions
                    .unwrap_or_default()
                    .into_iter()
                    .map(PaymentSession::from)
                    .collect(),
            }),
        }
    }
}

// =============================================================================
// Shipping Options
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct ShippingOptionWire {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub amount: i64,
}

impl From<ShippingOptionWire> for ShippingOption {
    fn from(option: ShippingOptionWire) -> Self {
        Self {
            id: ShippingOptionId::new(option.id),
            name: option.name,
            amount: option.amount,
        }
    }
}

// =============================================================================
// Orders & Completion
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct OrderWire {
    pub id: String,
    pub display_id: Option<i64>,
    pub email: Option<String>,
    pub currency_code: Option<String>,
    pub items: Option<Vec<LineItemWire>>,
    pub subtotal: Option<i64>,
    pub shipping_total: Option<i64>,
    pub tax_total: Option<i64>,
    pub total: Option<i64>,
    pub created_at: Option<DateTime<Utc>>,
}

impl From<OrderWire> for Order {
    fn from(order: OrderWire) -> Self {
        Self {
            id: OrderId::new(order.id),
            display_id: order.display_id,
            email: order.email,
            currency_code: currency_or_default(order.currency_code.as_deref()),
            items: order
                .items
                .unwrap_or_default()
                .into_iter()
                .map(LineItem::from)
                .collect(),
            totals: totals_from(
                order.subtotal,
                order.shipping_total,
                order.tax_total,
                order.total,
            ),
            created_at: order.created_at,
        }
    }
}

/// Pull a human-readable reason out of a completion `error` payload.
fn completion_message(error: Option<serde_json::Value>) -> Option<String> {
    match error? {
        serde_json::Value::String(message) => Some(message),
        serde_json::Value::Object(map) => map
            .get("message")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}

impl From<CompletionEnvelope> for Completion {
    fn from(envelope: CompletionEnvelope) -> Self {
        match envelope {
            CompletionEnvelope::Order { order } => Self::Order(order.into()),
            CompletionEnvelope::Cart { cart, error } => Self::Cart {
                cart: Box::new(cart.into()),
                message: completion_message(error),
            },
        }
    }
}

// =============================================================================
// Products
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct ProductWire {
    pub id: String,
    #[serde(default)]
    pub handle: String,
    #[serde(default)]
    pub title: String,
    pub description: Option<String>,
    pub thumbnail: Option<String>,
    pub variants: Option<Vec<VariantWire>>,
}

#[derive(Debug, Deserialize)]
pub struct VariantWire {
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub prices: Option<Vec<PriceWire>>,
    pub calculated_price: Option<CalculatedPriceWire>,
}

#[derive(Debug, Deserialize)]
pub struct PriceWire {
    pub amount: i64,
    pub currency_code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CalculatedPriceWire {
    pub calculated_amount: Option<i64>,
    pub currency_code: Option<String>,
}

impl From<VariantWire> for ProductVariant {
    fn from(variant: VariantWire) -> Self {
        // A region-calculated price wins over the raw price list.
        let calculated = variant.calculated_price.and_then(|p| {
            p.calculated_amount
                .map(|amount| Money::new(amount, currency_or_default(p.currency_code.as_deref())))
        });
        let prices = calculated.map_or_else(
            || {
                variant
                    .prices
                    .unwrap_or_default()
                    .into_iter()
                    .map(|p| Money::new(p.amount, currency_or_default(p.currency_code.as_deref())))
                    .collect()
            },
            |price| vec![price],
        );
        Self {
            id: VariantId::new(variant.id),
            title: variant.title,
            prices,
        }
    }
}

impl From<ProductWire> for Product {
    fn from(product: ProductWire) -> Self {
        Self {
            id: ProductId::new(product.id),
            handle: product.handle,
            title: product.title,
            description: product.description,
            thumbnail: product.thumbnail,
            variants: product
                .variants
                .unwrap_or_default()
                .into_iter()
                .map(ProductVariant::from)
                .collect(),
        }
    }
}

impl From<ProductsEnvelope> for ProductPage {
    fn from(envelope: ProductsEnvelope) -> Self {
        Self {
            products: envelope.products.into_iter().map(Product::from).collect(),
            count: envelope.count,
            offset: envelope.offset,
            limit: envelope.limit,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cart_conversion_with_totals_and_session() {
        let json = serde_json::json!({
            "id": "cart_1",
            "email": null,
            "region": { "id": "reg_1", "name": "EU", "currency_code": "eur" },
            "items": [{
                "id": "item_1",
                "variant_id": "variant_1",
                "title": "Tee",
                "unit_price": 500,
                "quantity": 2
            }],
            "subtotal": 1000,
            "total": 1000,
            "payment_collection": {
                "id": "paycol_1",
                "payment_sessions": [{
                    "id": "ps_1",
                    "provider_id": "pp_stripe_stripe",
                    "status": "pending",
                    "data": { "client_secret": "pi_1_secret_abc" }
                }]
            }
        });
        let cart: Cart = serde_json::from_value::<CartWire>(json).unwrap().into();

        assert_eq!(cart.currency_code, CurrencyCode::EUR);
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items[0].line_total, 1000);
        let totals = cart.totals.unwrap();
        assert_eq!(totals.subtotal, 1000);
        assert_eq!(totals.tax_total, 0);

        let stripe = PaymentProviderId::new(PaymentProviderId::STRIPE);
        assert_eq!(
            cart.confirmation_secret(&stripe).unwrap().expose(),
            "pi_1_secret_abc"
        );
    }

    #[test]
    fn test_line_total_fallback_saturates_instead_of_overflowing() {
        let json = serde_json::json!({
            "id": "item_1",
            "variant_id": "variant_1",
            "unit_price": i64::MAX / 2,
            "quantity": 3
        });
        let item: LineItem = serde_json::from_value::<LineItemWire>(json).unwrap().into();
        assert_eq!(item.line_total, i64::MAX);

        let negative = serde_json::json!({ "id": "item_2", "unit_price": i64::MIN, "quantity": 2 });
        let item: LineItem = serde_json::from_value::<LineItemWire>(negative).unwrap().into();
        assert_eq!(item.line_total, i64::MIN);
    }

    #[test]
    fn test_cart_without_totals_is_unknown_not_zero() {
        let json = serde_json::json!({ "id": "cart_1", "items": null });
        let cart: Cart = serde_json::from_value::<CartWire>(json).unwrap().into();

        assert!(cart.totals.is_none());
        assert!(cart.is_empty());
        assert_eq!(cart.currency_code, CurrencyCode::USD);
    }

    #[test]
    fn test_delete_envelope_accepts_parent_or_cart() {
        let parent: DeleteEnvelope =
            serde_json::from_value(serde_json::json!({ "parent": { "id": "cart_1" } })).unwrap();
        assert_eq!(parent.parent.id, "cart_1");

        let legacy: DeleteEnvelope =
            serde_json::from_value(serde_json::json!({ "cart": { "id": "cart_2" } })).unwrap();
        assert_eq!(legacy.parent.id, "cart_2");
    }

    #[test]
    fn test_completion_cart_carries_message() {
        let json = serde_json::json!({
            "type": "cart",
            "cart": { "id": "cart_1" },
            "error": { "message": "Payment authorization failed", "name": "Error" }
        });
        let completion: Completion = serde_json::from_value::<CompletionEnvelope>(json)
            .unwrap()
            .into();

        match completion {
            Completion::Cart { cart, message } => {
                assert_eq!(cart.id.as_str(), "cart_1");
                assert_eq!(message.as_deref(), Some("Payment authorization failed"));
            }
            Completion::Order(_) => panic!("expected cart completion"),
        }
    }

    #[test]
    fn test_variant_prefers_calculated_price() {
        let json = serde_json::json!({
            "id": "variant_1",
            "title": "S",
            "prices": [{ "amount": 900, "currency_code": "usd" }],
            "calculated_price": { "calculated_amount": 1200, "currency_code": "usd" }
        });
        let variant: ProductVariant = serde_json::from_value::<VariantWire>(json).unwrap().into();
        assert_eq!(variant.prices, vec![Money::new(1200, CurrencyCode::USD)]);
    }
}
