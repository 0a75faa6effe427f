//! Command implementations.
//!
//! Commands only wire the core together and print; cart and checkout rules
//! live in the storefront crate.

pub mod cart;
pub mod checkout;
pub mod order;
pub mod products;

use std::sync::Arc;

use medusa_store_storefront::cart::CartSessionManager;
use medusa_store_storefront::catalog::Catalog;
use medusa_store_storefront::config::StorefrontConfig;
use medusa_store_storefront::error::StorefrontError;
use medusa_store_storefront::gateway::{CommerceGateway, MedusaClient};
use medusa_store_storefront::session_store::{FileSessionStore, SessionStore};

/// The core components a command needs.
pub struct Storefront {
    pub cart: Arc<CartSessionManager>,
    pub catalog: Catalog,
}

impl Storefront {
    /// Build the core against the configured backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend URL cannot be used.
    pub fn connect(config: &StorefrontConfig) -> Result<Self, StorefrontError> {
        let gateway: Arc<dyn CommerceGateway> = Arc::new(MedusaClient::new(&config.medusa)?);
        let store: Arc<dyn SessionStore> =
            Arc::new(FileSessionStore::with_path(config.cart_store_path.clone()));
        Ok(Self::with_parts(gateway, store, config))
    }

    /// Build the core from explicit parts.
    pub fn with_parts(
        gateway: Arc<dyn CommerceGateway>,
        store: Arc<dyn SessionStore>,
        config: &StorefrontConfig,
    ) -> Self {
        let cart = CartSessionManager::new(Arc::clone(&gateway), store)
            .with_default_region(config.medusa.region_id.clone());
        Self {
            cart: Arc::new(cart),
            catalog: Catalog::new(gateway),
        }
    }
}

/// Print command output.
#[allow(clippy::print_stdout)]
pub fn print(text: &str) {
    println!("{text}");
}
