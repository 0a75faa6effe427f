//! Cart session manager.
//!
//! Holds the in-memory mirror of the shopper's remote cart. Every mutation
//! goes through the [`CommerceGateway`] and the mirror is replaced wholesale
//! by the cart the backend returns; nothing is patched locally ahead of
//! confirmation.
//!
//! # Concurrency
//!
//! - Mutations are serialized through an async mutex, so two overlapping
//!   calls never race on the same cart.
//! - A monotonically increasing epoch guards against stale responses:
//!   [`CartSessionManager::clear`] and [`CartSessionManager::detach`] bump
//!   it, and a response that lands under an older epoch is dropped with
//!   [`CartError::Superseded`] instead of being published.
//!
//! # Example
//!
//! ```rust,ignore
//! let manager = CartSessionManager::new(gateway, store);
//! manager.load().await;
//!
//! let mut updates = manager.subscribe();
//! let cart = manager.add_item(&VariantId::new("variant_1"), 1).await?;
//! assert_eq!(updates.borrow_and_update().cart.as_ref(), Some(&cart));
//! ```

mod error;

pub use error::CartError;

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{Mutex, watch};
use tracing::{debug, error, info, instrument, warn};

use medusa_store_core::{
    CartId, LineItemId, PaymentProviderId, RegionId, ShippingOptionId, VariantId,
};

use crate::error::add_breadcrumb;
use crate::gateway::{Cart, CartUpdate, CommerceGateway, Completion, GatewayError, ShippingOption};
use crate::session_store::SessionStore;

/// What subscribers see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartSnapshot {
    /// Current cart, or `None` when there is no active cart.
    pub cart: Option<Cart>,
    /// Whether a backend call is in flight. True until the first `load`.
    pub is_loading: bool,
}

/// Authoritative in-memory mirror of the shopper's remote cart.
pub struct CartSessionManager {
    gateway: Arc<dyn CommerceGateway>,
    store: Arc<dyn SessionStore>,
    default_region: Option<RegionId>,
    state: watch::Sender<CartSnapshot>,
    mutations: Mutex<()>,
    epoch: AtomicU64,
}

impl std::fmt::Debug for CartSessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartSessionManager")
            .field("default_region", &self.default_region)
            .field("snapshot", &*self.state.borrow())
            .field("epoch", &self.epoch.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl CartSessionManager {
    /// Create a manager. Call [`Self::load`] to pick up a stored session.
    #[must_use]
    pub fn new(gateway: Arc<dyn CommerceGateway>, store: Arc<dyn SessionStore>) -> Self {
        let (state, _) = watch::channel(CartSnapshot {
            cart: None,
            is_loading: true,
        });
        Self {
            gateway,
            store,
            default_region: None,
            state,
            mutations: Mutex::new(()),
            epoch: AtomicU64::new(0),
        }
    }

    /// Region used when a cart has to be created implicitly.
    #[must_use]
    pub fn with_default_region(mut self, region_id: Option<RegionId>) -> Self {
        self.default_region = region_id;
        self
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Subscribe to cart changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CartSnapshot> {
        self.state.subscribe()
    }

    /// Current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> CartSnapshot {
        self.state.borrow().clone()
    }

    /// Current cart, if any.
    #[must_use]
    pub fn cart(&self) -> Option<Cart> {
        self.state.borrow().cart.clone()
    }

    /// Total quantity across all lines (0 without a cart).
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.state.borrow().cart.as_ref().map_or(0, Cart::item_count)
    }

    // =========================================================================
    // Session lifecycle
    // =========================================================================

    /// Fetch the stored cart, if there is one.
    ///
    /// A stored id that no longer resolves is forgotten and the manager
    /// settles on "no cart"; the failure is logged, not returned.
    #[instrument(skip(self))]
    pub async fn load(&self) -> Option<Cart> {
        let _guard = self.mutations.lock().await;
        let epoch = self.current_epoch();

        let Some(cart_id) = self.stored_cart_id() else {
            self.set_loading(false);
            return None;
        };

        self.set_loading(true);
        match self.gateway.retrieve_cart(&cart_id).await {
            Ok(cart) => self.publish(epoch, cart).ok(),
            Err(e) => {
                if self.is_current(epoch) {
                    warn!(cart_id = %cart_id, error = %e, "Stored cart could not be fetched, starting fresh");
                    self.forget_session();
                }
                None
            }
        }
    }

    /// Return the current cart, creating one first if there is none.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::RemoteMutation`] if a cart cannot be created.
    #[instrument(skip(self))]
    pub async fn ensure_session(&self, region_id: Option<&RegionId>) -> Result<Cart, CartError> {
        let _guard = self.mutations.lock().await;
        let epoch = self.current_epoch();
        self.ensure_locked(epoch, region_id).await
    }

    /// Forget the session: clear the stored id and the in-memory cart.
    ///
    /// Responses to calls still in flight are discarded.
    pub fn clear(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.forget_session();
        info!("Cart session cleared");
    }

    /// Discard the results of every call currently in flight.
    pub fn detach(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.set_loading(false);
        debug!("Detached in-flight cart calls");
    }

    /// Re-fetch the cart.
    ///
    /// # Errors
    ///
    /// - [`CartError::SessionInvalid`] if the cart no longer exists (the
    ///   session is cleared)
    /// - [`CartError::NoActiveCart`] if there is no session
    /// - [`CartError::RemoteMutation`] for other failures
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<Cart, CartError> {
        let _guard = self.mutations.lock().await;
        let epoch = self.current_epoch();
        let cart_id = self.active_cart_id().ok_or(CartError::NoActiveCart)?;

        match self.gateway.retrieve_cart(&cart_id).await {
            Ok(cart) => self.publish(epoch, cart),
            Err(GatewayError::NotFound(_)) => {
                if self.is_current(epoch) {
                    warn!(cart_id = %cart_id, "Cart no longer exists, clearing session");
                    self.forget_session();
                }
                Err(CartError::SessionInvalid)
            }
            Err(e) => {
                self.settle_failure(epoch);
                Err(e.into())
            }
        }
    }

    // =========================================================================
    // Line items
    // =========================================================================

    /// Add a variant, creating the cart first if needed.
    ///
    /// # Errors
    ///
    /// - [`CartError::InvalidQuantity`] for a zero quantity
    /// - [`CartError::RemoteMutation`] if the backend rejects the line
    #[instrument(skip(self), fields(variant_id = %variant_id))]
    pub async fn add_item(&self, variant_id: &VariantId, quantity: u32) -> Result<Cart, CartError> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity);
        }
        add_breadcrumb(
            "cart",
            "Add to cart",
            Some(&[("variant_id", variant_id.as_str())]),
        );

        let _guard = self.mutations.lock().await;
        let epoch = self.current_epoch();
        let cart = self.ensure_locked(epoch, None).await?;

        self.set_loading(true);
        let result = self
            .gateway
            .add_line_item(&cart.id, variant_id, quantity)
            .await;
        self.finish(epoch, "add_item", result)
    }

    /// Set a line's quantity.
    ///
    /// Quantities below 1 never reach the backend: the call is a no-op
    /// returning `Ok(None)`. Use [`Self::remove_item`] instead.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::RemoteMutation`] if the update is rejected.
    #[instrument(skip(self), fields(line_id = %line_id))]
    pub async fn set_item_quantity(
        &self,
        line_id: &LineItemId,
        quantity: u32,
    ) -> Result<Option<Cart>, CartError> {
        if quantity < 1 {
            debug!("Ignoring quantity below 1; removal goes through remove_item");
            return Ok(None);
        }
        self.mutate("set_item_quantity", |cart_id| async move {
            self.gateway
                .update_line_item(&cart_id, line_id, quantity)
                .await
        })
        .await
        .map(Some)
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::RemoteMutation`] if the deletion is rejected.
    #[instrument(skip(self), fields(line_id = %line_id))]
    pub async fn remove_item(&self, line_id: &LineItemId) -> Result<Cart, CartError> {
        add_breadcrumb(
            "cart",
            "Remove from cart",
            Some(&[("line_id", line_id.as_str())]),
        );
        self.mutate("remove_item", |cart_id| async move {
            self.gateway.delete_line_item(&cart_id, line_id).await
        })
        .await
    }

    /// Merge email and addresses into the cart.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::RemoteMutation`] if the update is rejected.
    #[instrument(skip(self, update))]
    pub async fn patch_cart(&self, update: &CartUpdate) -> Result<Cart, CartError> {
        self.mutate("patch_cart", |cart_id| async move {
            self.gateway.update_cart(&cart_id, update).await
        })
        .await
    }

    // =========================================================================
    // Checkout side effects
    // =========================================================================

    /// Shipping options valid for the current cart.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::NoActiveCart`] or [`CartError::RemoteMutation`].
    #[instrument(skip(self))]
    pub async fn shipping_options(&self) -> Result<Vec<ShippingOption>, CartError> {
        let cart_id = self.active_cart_id().ok_or(CartError::NoActiveCart)?;
        Ok(self.gateway.list_shipping_options(&cart_id).await?)
    }

    /// Attach a shipping option.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::RemoteMutation`] if the option is rejected.
    #[instrument(skip(self), fields(option_id = %option_id))]
    pub async fn add_shipping_method(&self, option_id: &ShippingOptionId) -> Result<Cart, CartError> {
        self.mutate("add_shipping_method", |cart_id| async move {
            self.gateway.add_shipping_method(&cart_id, option_id).await
        })
        .await
    }

    /// Create (or replace) the provider's payment session and re-fetch the
    /// cart so the session is visible.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::RemoteMutation`] if either call fails.
    #[instrument(skip(self), fields(provider_id = %provider_id))]
    pub async fn initiate_payment_session(
        &self,
        provider_id: &PaymentProviderId,
    ) -> Result<Cart, CartError> {
        self.mutate("initiate_payment_session", |cart_id| async move {
            self.gateway
                .initiate_payment_session(&cart_id, provider_id)
                .await?;
            self.gateway.retrieve_cart(&cart_id).await
        })
        .await
    }

    /// Ask the backend to turn the cart into an order.
    ///
    /// A non-order answer republishes the returned cart; the session is
    /// never cleared here.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::NoActiveCart`] or [`CartError::RemoteMutation`].
    #[instrument(skip(self))]
    pub async fn complete(&self) -> Result<Completion, CartError> {
        let _guard = self.mutations.lock().await;
        let epoch = self.current_epoch();
        let cart_id = self.active_cart_id().ok_or(CartError::NoActiveCart)?;

        self.set_loading(true);
        match self.gateway.complete_cart(&cart_id).await {
            Ok(Completion::Cart { cart, message }) => {
                let cart = self.publish(epoch, *cart)?;
                Ok(Completion::Cart {
                    cart: Box::new(cart),
                    message,
                })
            }
            Ok(completion) => {
                self.settle_failure(epoch);
                Ok(completion)
            }
            Err(e) => {
                self.settle_failure(epoch);
                Err(e.into())
            }
        }
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn current_epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.current_epoch() == epoch
    }

    fn stored_cart_id(&self) -> Option<CartId> {
        match self.store.get() {
            Ok(cart_id) => cart_id,
            Err(e) => {
                warn!(error = %e, "Session store unreadable, treating as no cart");
                None
            }
        }
    }

    fn active_cart_id(&self) -> Option<CartId> {
        self.state
            .borrow()
            .cart
            .as_ref()
            .map(|cart| cart.id.clone())
            .or_else(|| self.stored_cart_id())
    }

    fn set_loading(&self, is_loading: bool) {
        self.state.send_if_modified(|snapshot| {
            let changed = snapshot.is_loading != is_loading;
            snapshot.is_loading = is_loading;
            changed
        });
    }

    /// Drop the stored id and publish "no cart".
    fn forget_session(&self) {
        if let Err(e) = self.store.clear() {
            error!(error = %e, "Failed to clear stored cart id");
        }
        self.state.send_replace(CartSnapshot {
            cart: None,
            is_loading: false,
        });
    }

    /// Publish a backend cart unless the session moved on meanwhile.
    fn publish(&self, epoch: u64, cart: Cart) -> Result<Cart, CartError> {
        if !self.is_current(epoch) {
            debug!(cart_id = %cart.id, "Discarding stale cart response");
            return Err(CartError::Superseded);
        }
        self.state.send_replace(CartSnapshot {
            cart: Some(cart.clone()),
            is_loading: false,
        });
        Ok(cart)
    }

    fn settle_failure(&self, epoch: u64) {
        if self.is_current(epoch) {
            self.set_loading(false);
        }
    }

    fn finish(
        &self,
        epoch: u64,
        operation: &'static str,
        result: Result<Cart, GatewayError>,
    ) -> Result<Cart, CartError> {
        match result {
            Ok(cart) => self.publish(epoch, cart),
            Err(e) => {
                warn!(operation, error = %e, "Cart mutation failed");
                self.settle_failure(epoch);
                Err(e.into())
            }
        }
    }

    /// Run one serialized mutation against the active cart.
    async fn mutate<F, Fut>(&self, operation: &'static str, call: F) -> Result<Cart, CartError>
    where
        F: FnOnce(CartId) -> Fut + Send,
        Fut: Future<Output = Result<Cart, GatewayError>> + Send,
    {
        let _guard = self.mutations.lock().await;
        let epoch = self.current_epoch();
        let cart_id = self.active_cart_id().ok_or(CartError::NoActiveCart)?;

        self.set_loading(true);
        let result = call(cart_id).await;
        self.finish(epoch, operation, result)
    }

    async fn ensure_locked(
        &self,
        epoch: u64,
        region_id: Option<&RegionId>,
    ) -> Result<Cart, CartError> {
        if let Some(cart) = self.cart() {
            return Ok(cart);
        }

        // A stored id that was never loaded: try it before starting over.
        if let Some(cart_id) = self.stored_cart_id() {
            match self.gateway.retrieve_cart(&cart_id).await {
                Ok(cart) => return self.publish(epoch, cart),
                Err(e) => {
                    warn!(cart_id = %cart_id, error = %e, "Stored cart unusable, creating a new one");
                }
            }
        }

        self.set_loading(true);
        let region_id = region_id.or(self.default_region.as_ref());
        let cart = match self.gateway.create_cart(region_id).await {
            Ok(cart) => cart,
            Err(e) => {
                warn!(error = %e, "Cart creation failed");
                self.settle_failure(epoch);
                return Err(e.into());
            }
        };

        if !self.is_current(epoch) {
            debug!(cart_id = %cart.id, "Discarding cart created before the session was cleared");
            return Err(CartError::Superseded);
        }
        if let Err(e) = self.store.set(&cart.id) {
            error!(cart_id = %cart.id, error = %e, "Failed to persist cart id");
        }
        info!(cart_id = %cart.id, "Created cart");
        self.publish(epoch, cart)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::gateway::mock::{FailOn, MockFailure, MockGateway, MockOperation};
    use crate::session_store::MemorySessionStore;

    fn manager_with(gateway: &MockGateway, store: Arc<MemorySessionStore>) -> CartSessionManager {
        CartSessionManager::new(Arc::new(gateway.clone()), store)
    }

    fn gateway() -> MockGateway {
        MockGateway::new()
            .with_variant("variant_1", "Tee", 500)
            .with_variant("variant_2", "Mug", 1200)
    }

    #[tokio::test]
    async fn test_load_without_session_settles_empty() {
        let gateway = gateway();
        let manager = manager_with(&gateway, Arc::new(MemorySessionStore::new()));
        assert!(manager.snapshot().is_loading);

        assert!(manager.load().await.is_none());

        let snapshot = manager.snapshot();
        assert!(snapshot.cart.is_none());
        assert!(!snapshot.is_loading);
        assert!(gateway.operations().is_empty());
    }

    #[tokio::test]
    async fn test_load_with_stale_id_clears_store() {
        let gateway = gateway();
        let store = Arc::new(MemorySessionStore::with_cart_id(CartId::new("cart_gone")));
        let manager = manager_with(&gateway, Arc::clone(&store));

        assert!(manager.load().await.is_none());
        assert!(store.get().unwrap().is_none());
        assert!(manager.cart().is_none());
    }

    #[tokio::test]
    async fn test_add_item_creates_and_persists_cart() {
        let gateway = gateway();
        let store = Arc::new(MemorySessionStore::new());
        let manager = manager_with(&gateway, Arc::clone(&store));

        let cart = manager
            .add_item(&VariantId::new("variant_1"), 1)
            .await
            .unwrap();

        assert_eq!(store.get().unwrap(), Some(cart.id.clone()));
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items[0].variant_id.as_str(), "variant_1");
        assert_eq!(manager.cart(), Some(cart));
    }

    #[tokio::test]
    async fn test_failed_add_leaves_mirror_unchanged() {
        let gateway = gateway();
        let manager = manager_with(&gateway, Arc::new(MemorySessionStore::new()));
        let before = manager
            .add_item(&VariantId::new("variant_1"), 1)
            .await
            .unwrap();

        let result = manager.add_item(&VariantId::new("variant_gone"), 1).await;

        assert!(matches!(result, Err(CartError::RemoteMutation(_))));
        assert_eq!(manager.cart(), Some(before));
        assert!(!manager.snapshot().is_loading);
    }

    #[tokio::test]
    async fn test_zero_quantity_never_reaches_gateway() {
        let gateway = gateway();
        let manager = manager_with(&gateway, Arc::new(MemorySessionStore::new()));
        let cart = manager
            .add_item(&VariantId::new("variant_1"), 2)
            .await
            .unwrap();
        gateway.clear_operations();

        let result = manager
            .set_item_quantity(&cart.items[0].id, 0)
            .await
            .unwrap();

        assert!(result.is_none());
        assert!(gateway.operations().is_empty());
        assert_eq!(manager.cart(), Some(cart));
    }

    #[tokio::test]
    async fn test_add_zero_is_rejected_locally() {
        let gateway = gateway();
        let manager = manager_with(&gateway, Arc::new(MemorySessionStore::new()));
        let result = manager.add_item(&VariantId::new("variant_1"), 0).await;
        assert!(matches!(result, Err(CartError::InvalidQuantity)));
        assert!(gateway.operations().is_empty());
    }

    #[tokio::test]
    async fn test_mutations_publish_last_response() {
        let gateway = gateway();
        let manager = manager_with(&gateway, Arc::new(MemorySessionStore::new()));
        let mut updates = manager.subscribe();

        let cart = manager
            .add_item(&VariantId::new("variant_1"), 1)
            .await
            .unwrap();
        let cart = manager
            .add_item(&VariantId::new("variant_2"), 1)
            .await
            .unwrap();
        let line = cart.items[0].id.clone();
        manager.set_item_quantity(&line, 3).await.unwrap();
        let last = manager
            .remove_item(&cart.items[1].id)
            .await
            .unwrap();

        assert!(updates.has_changed().unwrap());
        let seen = updates.borrow_and_update().cart.clone().unwrap();
        assert_eq!(seen, last);
        assert_eq!(gateway.cart(&last.id).unwrap(), last);
        assert_eq!(last.totals.unwrap().subtotal, 1500);
        assert_eq!(manager.item_count(), 3);
    }

    #[tokio::test]
    async fn test_refresh_not_found_is_session_invalid() {
        let gateway = gateway();
        let store = Arc::new(MemorySessionStore::new());
        let manager = manager_with(&gateway, Arc::clone(&store));
        manager
            .add_item(&VariantId::new("variant_1"), 1)
            .await
            .unwrap();
        gateway.set_fail_on(Some(FailOn::RetrieveCart(MockFailure::NotFound)));

        let result = manager.refresh().await;

        assert!(matches!(result, Err(CartError::SessionInvalid)));
        assert!(manager.cart().is_none());
        assert!(store.get().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_refresh_network_failure_keeps_session() {
        let gateway = gateway();
        let store = Arc::new(MemorySessionStore::new());
        let manager = manager_with(&gateway, Arc::clone(&store));
        manager
            .add_item(&VariantId::new("variant_1"), 1)
            .await
            .unwrap();
        gateway.set_fail_on(Some(FailOn::RetrieveCart(MockFailure::Unavailable)));

        let result = manager.refresh().await;

        assert!(matches!(result, Err(CartError::RemoteMutation(_))));
        assert!(manager.cart().is_some());
        assert!(store.get().unwrap().is_some());
    }

    #[tokio::test]
    async fn test_clear_discards_in_flight_response() {
        let (gateway, gate) = gateway().gated();
        let store = Arc::new(MemorySessionStore::new());
        let manager = Arc::new(manager_with(&gateway, Arc::clone(&store)));
        // Creating the cart and adding the first line.
        gate.add_permits(2);
        let cart = manager
            .add_item(&VariantId::new("variant_1"), 1)
            .await
            .unwrap();

        let pending = {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.add_item(&VariantId::new("variant_2"), 1).await })
        };
        tokio::task::yield_now().await;
        manager.clear();
        gate.add_permits(1);

        let result = pending.await.unwrap();
        assert!(matches!(result, Err(CartError::Superseded)));
        assert!(manager.cart().is_none());
        assert!(store.get().unwrap().is_none());
        assert_eq!(gateway.cart(&cart.id).unwrap().items.len(), 2);
    }

    #[tokio::test]
    async fn test_ensure_session_is_idempotent() {
        let gateway = gateway();
        let manager = manager_with(&gateway, Arc::new(MemorySessionStore::new()));

        let first = manager.ensure_session(None).await.unwrap();
        let second = manager.ensure_session(None).await.unwrap();

        assert_eq!(first.id, second.id);
        let creates = gateway
            .operations()
            .into_iter()
            .filter(|op| matches!(op, MockOperation::CreateCart { .. }))
            .count();
        assert_eq!(creates, 1);
    }

    #[tokio::test]
    async fn test_ensure_session_reuses_unloaded_stored_cart() {
        let gateway = gateway();
        let existing = gateway.create_cart(None).await.unwrap();
        let store = Arc::new(MemorySessionStore::with_cart_id(existing.id.clone()));
        let manager = manager_with(&gateway, store);

        let cart = manager.ensure_session(None).await.unwrap();

        assert_eq!(cart.id, existing.id);
    }

    #[tokio::test]
    async fn test_mutation_without_cart_fails() {
        let gateway = gateway();
        let manager = manager_with(&gateway, Arc::new(MemorySessionStore::new()));
        let result = manager.remove_item(&LineItemId::new("item_1")).await;
        assert!(matches!(result, Err(CartError::NoActiveCart)));
    }
}
