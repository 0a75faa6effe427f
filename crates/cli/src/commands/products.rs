//! Catalog commands.

use medusa_store_storefront::error::StorefrontError;

use super::{Storefront, print};
use crate::render;

/// List a page of products.
///
/// # Errors
///
/// Returns an error if the catalog cannot be read.
pub async fn list(store: &Storefront, limit: u32, offset: u32) -> Result<(), StorefrontError> {
    let page = store.catalog.list_products(limit, offset).await?;
    print(&render::product_page(&page));
    Ok(())
}

/// Show a product by handle.
///
/// # Errors
///
/// Returns an error if the product does not exist or cannot be read.
pub async fn show(store: &Storefront, handle: &str) -> Result<(), StorefrontError> {
    let product = store.catalog.product_by_handle(handle).await?;
    print(&render::product(&product));
    Ok(())
}
