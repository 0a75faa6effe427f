//! Cart commands.
//!
//! Every command first restores the session from the stored cart id.

use medusa_store_core::{LineItemId, VariantId};
use medusa_store_storefront::error::StorefrontError;

use super::{Storefront, print};
use crate::render;

/// Show the cart.
pub async fn show(store: &Storefront) {
    match store.cart.load().await {
        Some(cart) => print(&render::cart(&cart)),
        None => print("Your cart is empty."),
    }
}

/// Add a variant, creating the cart if needed.
///
/// # Errors
///
/// Returns an error if the backend rejects the line.
pub async fn add(store: &Storefront, variant_id: &str, quantity: u32) -> Result<(), StorefrontError> {
    store.cart.load().await;
    let cart = store
        .cart
        .add_item(&VariantId::new(variant_id), quantity)
        .await?;
    print(&render::cart(&cart));
    Ok(())
}

/// Set a line's quantity. Zero removes the line.
///
/// # Errors
///
/// Returns an error if there is no cart or the backend rejects the change.
pub async fn set(store: &Storefront, line_id: &str, quantity: u32) -> Result<(), StorefrontError> {
    if quantity == 0 {
        return remove(store, line_id).await;
    }

    store.cart.load().await;
    if let Some(cart) = store
        .cart
        .set_item_quantity(&LineItemId::new(line_id), quantity)
        .await?
    {
        print(&render::cart(&cart));
    }
    Ok(())
}

/// Remove a line.
///
/// # Errors
///
/// Returns an error if there is no cart or the backend rejects the change.
pub async fn remove(store: &Storefront, line_id: &str) -> Result<(), StorefrontError> {
    store.cart.load().await;
    let cart = store.cart.remove_item(&LineItemId::new(line_id)).await?;
    print(&render::cart(&cart));
    Ok(())
}

/// Forget the stored cart id.
pub fn clear(store: &Storefront) {
    store.cart.clear();
    print("Cart cleared.");
}
