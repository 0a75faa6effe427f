//! Commerce backend gateway.
//!
//! # Architecture
//!
//! - [`CommerceGateway`] is the seam between session logic and the backend
//! - [`MedusaClient`] talks to the Medusa store REST API over `reqwest`
//! - The backend is the source of truth: no local sync, every mutation
//!   returns the full updated cart
//!
//! # Example
//!
//! ```rust,ignore
//! use medusa_store_storefront::gateway::{CommerceGateway, MedusaClient};
//!
//! let client = MedusaClient::new(&config.medusa)?;
//!
//! let cart = client.create_cart(None).await?;
//! let cart = client.add_line_item(&cart.id, &variant_id, 1).await?;
//! ```

mod medusa;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod types;

pub use medusa::MedusaClient;
pub use types::*;

use async_trait::async_trait;
use thiserror::Error;

use medusa_store_core::{
    CartId, LineItemId, OrderId, PaymentProviderId, ProductId, RegionId, ShippingOptionId,
    VariantId,
};

/// Errors that can occur when talking to the commerce backend.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// HTTP request failed before a response arrived.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("Backend error {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Message extracted from the response body.
        message: String,
    },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limited by the backend.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// The request was rejected as invalid (bad input, unknown variant, ...).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl GatewayError {
    /// Whether the request never reached the backend.
    #[must_use]
    pub fn is_connect(&self) -> bool {
        matches!(self, Self::Http(e) if e.is_connect())
    }

    /// Whether a later attempt of the same request may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_connect() || e.is_timeout(),
            Self::RateLimited(_) => true,
            Self::Api { status, .. } => matches!(status, 502..=504),
            Self::Parse(_) | Self::NotFound(_) | Self::InvalidRequest(_) => false,
        }
    }
}

/// Operations the storefront needs from the commerce backend.
///
/// Every cart mutation resolves to the full updated cart (or an error),
/// never a partial delta.
#[async_trait]
pub trait CommerceGateway: Send + Sync {
    /// Fetch a cart.
    async fn retrieve_cart(&self, cart_id: &CartId) -> Result<Cart, GatewayError>;

    /// Create an empty cart, optionally in a specific region.
    async fn create_cart(&self, region_id: Option<&RegionId>) -> Result<Cart, GatewayError>;

    /// Merge email and addresses into a cart.
    async fn update_cart(&self, cart_id: &CartId, update: &CartUpdate)
    -> Result<Cart, GatewayError>;

    /// Add a variant to a cart.
    async fn add_line_item(
        &self,
        cart_id: &CartId,
        variant_id: &VariantId,
        quantity: u32,
    ) -> Result<Cart, GatewayError>;

    /// Set the quantity of an existing line.
    async fn update_line_item(
        &self,
        cart_id: &CartId,
        line_id: &LineItemId,
        quantity: u32,
    ) -> Result<Cart, GatewayError>;

    /// Remove a line.
    async fn delete_line_item(
        &self,
        cart_id: &CartId,
        line_id: &LineItemId,
    ) -> Result<Cart, GatewayError>;

    /// Shipping options valid for a cart.
    async fn list_shipping_options(
        &self,
        cart_id: &CartId,
    ) -> Result<Vec<ShippingOption>, GatewayError>;

    /// Attach a shipping option to a cart.
    async fn add_shipping_method(
        &self,
        cart_id: &CartId,
        option_id: &ShippingOptionId,
    ) -> Result<Cart, GatewayError>;

    /// Create or refresh the provider's payment session on a cart.
    async fn initiate_payment_session(
        &self,
        cart_id: &CartId,
        provider_id: &PaymentProviderId,
    ) -> Result<(), GatewayError>;

    /// Turn a cart into an order.
    async fn complete_cart(&self, cart_id: &CartId) -> Result<Completion, GatewayError>;

    /// List products.
    async fn list_products(&self, query: &ProductQuery) -> Result<ProductPage, GatewayError>;

    /// Fetch one product.
    async fn get_product(&self, product_id: &ProductId) -> Result<Product, GatewayError>;

    /// Fetch a placed order.
    async fn get_order(&self, order_id: &OrderId) -> Result<Order, GatewayError>;
}
