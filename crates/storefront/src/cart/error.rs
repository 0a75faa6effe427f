//! Cart session errors.

use thiserror::Error;

use crate::gateway::GatewayError;

/// Errors from cart session operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// The stored cart id no longer resolves; the session was reset.
    #[error("Cart session is no longer valid")]
    SessionInvalid,

    /// The backend rejected the mutation or could not be reached.
    /// The local cart is unchanged.
    #[error("Cart update failed: {0}")]
    RemoteMutation(#[from] GatewayError),

    /// The operation needs a cart and there is none.
    #[error("No active cart")]
    NoActiveCart,

    /// Line quantities start at 1.
    #[error("Quantity must be at least 1")]
    InvalidQuantity,

    /// The session was cleared or detached while the request was in flight;
    /// its response was discarded.
    #[error("Cart changed while the request was in flight")]
    Superseded,
}

impl CartError {
    /// Whether the shopper can simply try again.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::RemoteMutation(_) | Self::Superseded)
    }
}
