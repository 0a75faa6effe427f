//! gateway::mock
//!
//! In-memory commerce backend for deterministic testing.
//!
//! # Design
//!
//! The mock keeps carts, a variant price list, shipping options and placed
//! orders in memory. Like the real backend it computes totals itself, so a
//! caller can only ever observe totals by reading what the mock returned.
//! Failures can be injected per operation and every call is recorded.
//!
//! # Example
//!
//! ```rust,ignore
//! use medusa_store_core::VariantId;
//! use medusa_store_storefront::gateway::mock::MockGateway;
//! use medusa_store_storefront::gateway::CommerceGateway;
//!
//! let gateway = MockGateway::new().with_variant("variant_1", "Tee", 500);
//!
//! let cart = gateway.create_cart(None).await.unwrap();
//! let cart = gateway
//!     .add_line_item(&cart.id, &VariantId::new("variant_1"), 2)
//!     .await
//!     .unwrap();
//! assert_eq!(cart.totals.unwrap().subtotal, 1000);
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::Semaphore;

use medusa_store_core::{
    CartId, CurrencyCode, LineItemId, Money, OrderId, PaymentCollectionId, PaymentProviderId,
    PaymentSessionId, PaymentSessionStatus, ProductId, RegionId, ShippingOptionId, VariantId,
};

use super::types::{
    Cart, CartUpdate, ClientSecret, Completion, LineItem, Order, PaymentCollection,
    PaymentSession, Product, ProductPage, ProductQuery, ProductVariant, Region, ShippingMethod,
    ShippingOption, Totals,
};
use super::{CommerceGateway, GatewayError};

/// Mock commerce backend for testing.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping; clones share state.
#[derive(Debug, Clone)]
pub struct MockGateway {
    inner: Arc<Mutex<MockGatewayInner>>,
    /// When set, every mutation waits for a permit before touching state.
    gate: Option<Arc<Semaphore>>,
}

#[derive(Debug)]
struct MockGatewayInner {
    carts: HashMap<CartId, Cart>,
    variants: HashMap<VariantId, (String, i64)>,
    shipping_options: Vec<ShippingOption>,
    products: Vec<Product>,
    orders: HashMap<OrderId, Order>,
    /// Providers whose sessions carry a confirmation secret.
    secret_providers: HashSet<PaymentProviderId>,
    issue_secrets: bool,
    completion_mode: CompletionMode,
    tax_rate_bps: i64,
    next_id: u64,
    fail_on: Option<FailOn>,
    operations: Vec<MockOperation>,
}

/// How `complete_cart` answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionMode {
    /// Place an order when the cart has a payment session.
    Normal,
    /// Always answer with the cart and this reason.
    RequireAction(String),
}

/// Failure to inject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockFailure {
    /// The backend is unreachable (maps to a 503).
    Unavailable,
    /// The resource does not exist.
    NotFound,
    /// The request was rejected with a reason.
    Rejected(String),
}

impl MockFailure {
    fn into_error(self, what: &str) -> GatewayError {
        match self {
            Self::Unavailable => GatewayError::Api {
                status: 503,
                message: "service unavailable".to_string(),
            },
            Self::NotFound => GatewayError::NotFound(what.to_string()),
            Self::Rejected(reason) => GatewayError::InvalidRequest(reason),
        }
    }
}

/// Configuration for which operation should fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailOn {
    RetrieveCart(MockFailure),
    CreateCart(MockFailure),
    UpdateCart(MockFailure),
    AddLineItem(MockFailure),
    UpdateLineItem(MockFailure),
    DeleteLineItem(MockFailure),
    ListShippingOptions(MockFailure),
    AddShippingMethod(MockFailure),
    InitiatePaymentSession(MockFailure),
    CompleteCart(MockFailure),
}

/// Recorded operation for test verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOperation {
    RetrieveCart {
        cart_id: CartId,
    },
    CreateCart {
        region_id: Option<RegionId>,
    },
    UpdateCart {
        cart_id: CartId,
        update: CartUpdate,
    },
    AddLineItem {
        cart_id: CartId,
        variant_id: VariantId,
        quantity: u32,
    },
    UpdateLineItem {
        cart_id: CartId,
        line_id: LineItemId,
        quantity: u32,
    },
    DeleteLineItem {
        cart_id: CartId,
        line_id: LineItemId,
    },
    ListShippingOptions {
        cart_id: CartId,
    },
    AddShippingMethod {
        cart_id: CartId,
        option_id: ShippingOptionId,
    },
    InitiatePaymentSession {
        cart_id: CartId,
        provider_id: PaymentProviderId,
    },
    CompleteCart {
        cart_id: CartId,
    },
    ListProducts,
    GetProduct {
        product_id: ProductId,
    },
    GetOrder {
        order_id: OrderId,
    },
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGateway {
    /// Create an empty mock backend with one free shipping option.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockGatewayInner {
                carts: HashMap::new(),
                variants: HashMap::new(),
                shipping_options: vec![ShippingOption {
                    id: ShippingOptionId::new("so_standard"),
                    name: "Standard Shipping".to_string(),
                    amount: 0,
                }],
                products: Vec::new(),
                orders: HashMap::new(),
                secret_providers: HashSet::from([PaymentProviderId::new(
                    PaymentProviderId::STRIPE,
                )]),
                issue_secrets: true,
                completion_mode: CompletionMode::Normal,
                tax_rate_bps: 0,
                next_id: 1,
                fail_on: None,
                operations: Vec::new(),
            })),
            gate: None,
        }
    }

    fn state(&self) -> MutexGuard<'_, MockGatewayInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a purchasable variant with its unit price.
    #[must_use]
    pub fn with_variant(self, id: &str, title: &str, unit_price: i64) -> Self {
        self.state()
            .variants
            .insert(VariantId::new(id), (title.to_string(), unit_price));
        self
    }

    /// Replace the shipping options offered for every cart.
    #[must_use]
    pub fn with_shipping_options(self, options: Vec<ShippingOption>) -> Self {
        self.state().shipping_options = options;
        self
    }

    /// Add a catalog product.
    #[must_use]
    pub fn with_product(self, product: Product) -> Self {
        self.state().products.push(product);
        self
    }

    /// Tax charged on the subtotal, in basis points.
    #[must_use]
    pub fn with_tax_rate_bps(self, bps: i64) -> Self {
        self.state().tax_rate_bps = bps;
        self
    }

    /// Seed an existing cart (e.g., one created in an earlier process).
    #[must_use]
    pub fn with_cart(self, cart: Cart) -> Self {
        self.state().carts.insert(cart.id.clone(), cart);
        self
    }

    /// Configure the mock to fail on a specific operation.
    #[must_use]
    pub fn fail_on(self, fail_on: FailOn) -> Self {
        self.state().fail_on = Some(fail_on);
        self
    }

    /// Set or change the failure configuration on a shared handle.
    pub fn set_fail_on(&self, fail_on: Option<FailOn>) {
        self.state().fail_on = fail_on;
    }

    /// Stop attaching confirmation secrets to new payment sessions.
    pub fn set_issue_secrets(&self, issue: bool) {
        self.state().issue_secrets = issue;
    }

    /// Change how `complete_cart` answers.
    pub fn set_completion_mode(&self, mode: CompletionMode) {
        self.state().completion_mode = mode;
    }

    /// Hold every mutation until the returned semaphore gets a permit.
    #[must_use]
    pub fn gated(mut self) -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        self.gate = Some(Arc::clone(&gate));
        (self, gate)
    }

    /// Get all recorded operations.
    #[must_use]
    pub fn operations(&self) -> Vec<MockOperation> {
        self.state().operations.clone()
    }

    /// Forget recorded operations.
    pub fn clear_operations(&self) {
        self.state().operations.clear();
    }

    /// Current server-side copy of a cart.
    #[must_use]
    pub fn cart(&self, cart_id: &CartId) -> Option<Cart> {
        self.state().carts.get(cart_id).cloned()
    }

    async fn wait_for_gate(&self) {
        if let Some(gate) = &self.gate
            && let Ok(permit) = gate.acquire().await
        {
            permit.forget();
        }
    }
}

impl MockGatewayInner {
    fn next_id(&mut self, prefix: &str) -> String {
        let id = format!("{prefix}_{}", self.next_id);
        self.next_id += 1;
        id
    }

    /// Record the call and fire the configured failure if it matches.
    fn enter(&mut self, operation: MockOperation) -> Result<(), GatewayError> {
        let failure = match (&self.fail_on, &operation) {
            (Some(FailOn::RetrieveCart(f)), MockOperation::RetrieveCart { .. })
            | (Some(FailOn::CreateCart(f)), MockOperation::CreateCart { .. })
            | (Some(FailOn::UpdateCart(f)), MockOperation::UpdateCart { .. })
            | (Some(FailOn::AddLineItem(f)), MockOperation::AddLineItem { .. })
            | (Some(FailOn::UpdateLineItem(f)), MockOperation::UpdateLineItem { .. })
            | (Some(FailOn::DeleteLineItem(f)), MockOperation::DeleteLineItem { .. })
            | (Some(FailOn::ListShippingOptions(f)), MockOperation::ListShippingOptions { .. })
            | (Some(FailOn::AddShippingMethod(f)), MockOperation::AddShippingMethod { .. })
            | (
                Some(FailOn::InitiatePaymentSession(f)),
                MockOperation::InitiatePaymentSession { .. },
            )
            | (Some(FailOn::CompleteCart(f)), MockOperation::CompleteCart { .. }) => {
                Some(f.clone())
            }
            _ => None,
        };
        let what = format!("{operation:?}");
        self.operations.push(operation);
        failure.map_or(Ok(()), |f| Err(f.into_error(&what)))
    }

    fn cart_mut(&mut self, cart_id: &CartId) -> Result<&mut Cart, GatewayError> {
        self.carts
            .get_mut(cart_id)
            .ok_or_else(|| GatewayError::NotFound(format!("Cart not found: {cart_id}")))
    }

    /// Recompute totals the way the backend does and return a copy.
    fn settle(&mut self, cart_id: &CartId) -> Result<Cart, GatewayError> {
        let tax_rate_bps = self.tax_rate_bps;
        let cart = self.cart_mut(cart_id)?;
        for item in &mut cart.items {
            item.line_total = item.unit_price.saturating_mul(i64::from(item.quantity));
        }
        let subtotal: i64 = cart.items.iter().map(|item| item.line_total).sum();
        let shipping_total: i64 = cart.shipping_methods.iter().map(|m| m.amount).sum();
        let tax_total = subtotal * tax_rate_bps / 10_000;
        cart.totals = Some(Totals {
            subtotal,
            shipping_total,
            tax_total,
            total: subtotal + shipping_total + tax_total,
        });
        Ok(cart.clone())
    }
}

#[async_trait]
impl CommerceGateway for MockGateway {
    async fn retrieve_cart(&self, cart_id: &CartId) -> Result<Cart, GatewayError> {
        let mut state = self.state();
        state.enter(MockOperation::RetrieveCart {
            cart_id: cart_id.clone(),
        })?;
        state.settle(cart_id)
    }

    async fn create_cart(&self, region_id: Option<&RegionId>) -> Result<Cart, GatewayError> {
        self.wait_for_gate().await;
        let mut state = self.state();
        state.enter(MockOperation::CreateCart {
            region_id: region_id.cloned(),
        })?;
        let id = CartId::new(state.next_id("cart"));
        let cart = Cart {
            id: id.clone(),
            email: None,
            region: region_id.map(|id| Region {
                id: id.clone(),
                name: "Default".to_string(),
                currency_code: CurrencyCode::USD,
            }),
            currency_code: CurrencyCode::USD,
            items: Vec::new(),
            totals: None,
            shipping_address: None,
            shipping_methods: Vec::new(),
            payment_collection: None,
        };
        state.carts.insert(id.clone(), cart);
        state.settle(&id)
    }

    async fn update_cart(
        &self,
        cart_id: &CartId,
        update: &CartUpdate,
    ) -> Result<Cart, GatewayError> {
        self.wait_for_gate().await;
        let mut state = self.state();
        state.enter(MockOperation::UpdateCart {
            cart_id: cart_id.clone(),
            update: update.clone(),
        })?;
        let cart = state.cart_mut(cart_id)?;
        if let Some(email) = &update.email {
            cart.email = Some(email.clone());
        }
        if let Some(address) = &update.shipping_address {
            cart.shipping_address = Some(address.clone());
        }
        state.settle(cart_id)
    }

    async fn add_line_item(
        &self,
        cart_id: &CartId,
        variant_id: &VariantId,
        quantity: u32,
    ) -> Result<Cart, GatewayError> {
        self.wait_for_gate().await;
        let mut state = self.state();
        state.enter(MockOperation::AddLineItem {
            cart_id: cart_id.clone(),
            variant_id: variant_id.clone(),
            quantity,
        })?;
        let (title, unit_price) = state.variants.get(variant_id).cloned().ok_or_else(|| {
            GatewayError::InvalidRequest(format!("Variant {variant_id} is not available"))
        })?;
        let line_id = LineItemId::new(state.next_id("item"));
        let cart = state.cart_mut(cart_id)?;
        if let Some(existing) = cart
            .items
            .iter_mut()
            .find(|item| &item.variant_id == variant_id)
        {
            existing.quantity += quantity;
        } else {
            cart.items.push(LineItem {
                id: line_id,
                variant_id: variant_id.clone(),
                title,
                variant_title: None,
                thumbnail: None,
                unit_price,
                quantity,
                line_total: 0,
            });
        }
        state.settle(cart_id)
    }

    async fn update_line_item(
        &self,
        cart_id: &CartId,
        line_id: &LineItemId,
        quantity: u32,
    ) -> Result<Cart, GatewayError> {
        self.wait_for_gate().await;
        let mut state = self.state();
        state.enter(MockOperation::UpdateLineItem {
            cart_id: cart_id.clone(),
            line_id: line_id.clone(),
            quantity,
        })?;
        if quantity == 0 {
            return Err(GatewayError::InvalidRequest(
                "quantity must be greater than 0".to_string(),
            ));
        }
        let cart = state.cart_mut(cart_id)?;
        let item = cart
            .items
            .iter_mut()
            .find(|item| &item.id == line_id)
            .ok_or_else(|| GatewayError::NotFound(format!("Line item not found: {line_id}")))?;
        item.quantity = quantity;
        state.settle(cart_id)
    }

    async fn delete_line_item(
        &self,
        cart_id: &CartId,
        line_id: &LineItemId,
    ) -> Result<Cart, GatewayError> {
        self.wait_for_gate().await;
        let mut state = self.state();
        state.enter(MockOperation::DeleteLineItem {
            cart_id: cart_id.clone(),
            line_id: line_id.clone(),
        })?;
        let cart = state.cart_mut(cart_id)?;
        let before = cart.items.len();
        cart.items.retain(|item| &item.id != line_id);
        if cart.items.len() == before {
            return Err(GatewayError::NotFound(format!(
                "Line item not found: {line_id}"
            )));
        }
        state.settle(cart_id)
    }

    async fn list_shipping_options(
        &self,
        cart_id: &CartId,
    ) -> Result<Vec<ShippingOption>, GatewayError> {
        let mut state = self.state();
        state.enter(MockOperation::ListShippingOptions {
            cart_id: cart_id.clone(),
        })?;
        state.cart_mut(cart_id)?;
        Ok(state.shipping_options.clone())
    }

    async fn add_shipping_method(
        &self,
        cart_id: &CartId,
        option_id: &ShippingOptionId,
    ) -> Result<Cart, GatewayError> {
        self.wait_for_gate().await;
        let mut state = self.state();
        state.enter(MockOperation::AddShippingMethod {
            cart_id: cart_id.clone(),
            option_id: option_id.clone(),
        })?;
        let option = state
            .shipping_options
            .iter()
            .find(|o| &o.id == option_id)
            .cloned()
            .ok_or_else(|| {
                GatewayError::InvalidRequest(format!("Shipping option {option_id} is not valid"))
            })?;
        let cart = state.cart_mut(cart_id)?;
        cart.shipping_methods = vec![ShippingMethod {
            shipping_option_id: Some(option.id),
            name: option.name,
            amount: option.amount,
        }];
        state.settle(cart_id)
    }

    async fn initiate_payment_session(
        &self,
        cart_id: &CartId,
        provider_id: &PaymentProviderId,
    ) -> Result<(), GatewayError> {
        self.wait_for_gate().await;
        let mut state = self.state();
        state.enter(MockOperation::InitiatePaymentSession {
            cart_id: cart_id.clone(),
            provider_id: provider_id.clone(),
        })?;
        let session_id = state.next_id("ps");
        let collection_id = state.next_id("paycol");
        let client_secret = (state.issue_secrets && state.secret_providers.contains(provider_id))
            .then(|| ClientSecret::new(format!("pi_{session_id}_secret_mock")));
        let cart = state.cart_mut(cart_id)?;
        let collection = cart
            .payment_collection
            .get_or_insert_with(|| PaymentCollection {
                id: Some(PaymentCollectionId::new(collection_id)),
                payment_sessions: Vec::new(),
            });
        // Re-initiating replaces the provider's pending session.
        collection.payment_sessions.retain(|s| {
            !(&s.provider_id == provider_id && s.status == PaymentSessionStatus::Pending)
        });
        collection.payment_sessions.push(PaymentSession {
            id: PaymentSessionId::new(session_id),
            provider_id: provider_id.clone(),
            status: PaymentSessionStatus::Pending,
            client_secret,
        });
        Ok(())
    }

    async fn complete_cart(&self, cart_id: &CartId) -> Result<Completion, GatewayError> {
        self.wait_for_gate().await;
        let mut state = self.state();
        state.enter(MockOperation::CompleteCart {
            cart_id: cart_id.clone(),
        })?;
        let cart = state.settle(cart_id)?;

        let has_session = cart
            .payment_collection
            .as_ref()
            .is_some_and(|pc| !pc.payment_sessions.is_empty());
        let refusal = match &state.completion_mode {
            CompletionMode::RequireAction(reason) => Some(reason.clone()),
            CompletionMode::Normal if !has_session => {
                Some("Payment sessions are required to complete cart".to_string())
            }
            CompletionMode::Normal => None,
        };
        if let Some(message) = refusal {
            return Ok(Completion::Cart {
                cart: Box::new(cart),
                message: Some(message),
            });
        }

        let display_id = i64::try_from(state.orders.len()).unwrap_or(i64::MAX) + 1;
        let order = Order {
            id: OrderId::new(state.next_id("order")),
            display_id: Some(display_id),
            email: cart.email.clone(),
            currency_code: cart.currency_code.clone(),
            items: cart.items.clone(),
            totals: cart.totals,
            created_at: Some(chrono::Utc::now()),
        };
        state.carts.remove(cart_id);
        state.orders.insert(order.id.clone(), order.clone());
        Ok(Completion::Order(order))
    }

    async fn list_products(&self, query: &ProductQuery) -> Result<ProductPage, GatewayError> {
        let mut state = self.state();
        state.enter(MockOperation::ListProducts)?;
        let matching: Vec<Product> = state
            .products
            .iter()
            .filter(|p| query.handle.as_ref().is_none_or(|h| &p.handle == h))
            .cloned()
            .collect();
        let offset = query.offset.unwrap_or(0);
        let limit = query.limit.unwrap_or(20);
        let products = matching
            .iter()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect();
        Ok(ProductPage {
            products,
            count: matching.len() as u64,
            offset,
            limit,
        })
    }

    async fn get_product(&self, product_id: &ProductId) -> Result<Product, GatewayError> {
        let mut state = self.state();
        state.enter(MockOperation::GetProduct {
            product_id: product_id.clone(),
        })?;
        state
            .products
            .iter()
            .find(|p| &p.id == product_id)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(format!("Product not found: {product_id}")))
    }

    async fn get_order(&self, order_id: &OrderId) -> Result<Order, GatewayError> {
        let mut state = self.state();
        state.enter(MockOperation::GetOrder {
            order_id: order_id.clone(),
        })?;
        state
            .orders
            .get(order_id)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(format!("Order not found: {order_id}")))
    }
}

/// A single-variant product priced in USD, for catalog tests.
#[must_use]
pub fn sample_product(id: &str, handle: &str, variant_id: &str, price: i64) -> Product {
    Product {
        id: ProductId::new(id),
        handle: handle.to_string(),
        title: handle.replace('-', " "),
        description: None,
        thumbnail: None,
        variants: vec![ProductVariant {
            id: VariantId::new(variant_id),
            title: "Default".to_string(),
            prices: vec![Money::new(price, CurrencyCode::USD)],
        }],
    }
}
