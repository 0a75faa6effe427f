//! Durable storage for the active cart identifier.
//!
//! Exactly one opaque cart id is stored per client. Absence means there is no
//! active cart. The store is injected into the cart session manager so the
//! core runs without a real storage backend in tests.

mod file_store;
mod memory;

pub use file_store::FileSessionStore;
pub use memory::MemorySessionStore;

use thiserror::Error;

use medusa_store_core::CartId;

/// Errors from session storage.
#[derive(Debug, Error)]
pub enum SessionStoreError {
    /// Could not read the stored identifier.
    #[error("cannot read session: {0}")]
    Read(String),
    /// Could not write or remove the stored identifier.
    #[error("cannot write session: {0}")]
    Write(String),
}

/// Holds the single active cart identifier.
pub trait SessionStore: Send + Sync {
    /// The stored cart id, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be read.
    fn get(&self) -> Result<Option<CartId>, SessionStoreError>;

    /// Store a cart id, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be written.
    fn set(&self, cart_id: &CartId) -> Result<(), SessionStoreError>;

    /// Forget the stored cart id. Clearing an empty store succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be written.
    fn clear(&self) -> Result<(), SessionStoreError>;
}
