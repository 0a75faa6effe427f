//! Order commands.

use medusa_store_core::OrderId;
use medusa_store_storefront::error::StorefrontError;

use super::{Storefront, print};
use crate::render;

/// Show a placed order.
///
/// # Errors
///
/// Returns an error if the order does not exist or cannot be read.
pub async fn show(store: &Storefront, order_id: &str) -> Result<(), StorefrontError> {
    let order = store.catalog.order(&OrderId::new(order_id)).await?;
    print(&render::order(&order));
    Ok(())
}
