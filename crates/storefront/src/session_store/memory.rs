//! In-memory session store.

use std::sync::{Mutex, PoisonError};

use medusa_store_core::CartId;

use super::{SessionStore, SessionStoreError};

/// Session store that lives only as long as the process.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    cart_id: Mutex<Option<CartId>>,
}

impl MemorySessionStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds a cart id.
    #[must_use]
    pub fn with_cart_id(cart_id: CartId) -> Self {
        Self {
            cart_id: Mutex::new(Some(cart_id)),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self) -> Result<Option<CartId>, SessionStoreError> {
        Ok(self
            .cart_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn set(&self, cart_id: &CartId) -> Result<(), SessionStoreError> {
        *self.cart_id.lock().unwrap_or_else(PoisonError::into_inner) = Some(cart_id.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionStoreError> {
        *self.cart_id.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_clear() {
        let store = MemorySessionStore::new();
        assert!(store.get().unwrap().is_none());

        store.set(&CartId::new("cart_1")).unwrap();
        assert_eq!(store.get().unwrap(), Some(CartId::new("cart_1")));

        store.clear().unwrap();
        store.clear().unwrap();
        assert!(store.get().unwrap().is_none());
    }
}
