//! Medusa Store storefront core.
//!
//! Cart session and checkout logic for a shopper-facing client of a Medusa
//! commerce backend, with Stripe card confirmation.
//!
//! # Architecture
//!
//! - [`gateway`]: the commerce backend seam and its Medusa REST client
//! - [`session_store`]: durable storage for the active cart id
//! - [`cart`]: the cart session manager (in-memory mirror of the remote cart)
//! - [`checkout`]: the shipping → payment → review state machine
//! - [`payment`]: client-side payment confirmation (Stripe)
//! - [`providers`]: payment provider capabilities
//! - [`catalog`]: cached product reads and order lookup
//!
//! Presentation (pages, widgets, a CLI) sits on top and only talks to the
//! cart session manager, the checkout orchestrator and the catalog.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod config;
pub mod error;
pub mod gateway;
pub mod payment;
pub mod providers;
pub mod session_store;
pub mod telemetry;

pub use cart::{CartError, CartSessionManager, CartSnapshot};
pub use catalog::Catalog;
pub use checkout::{CheckoutError, CheckoutOrchestrator, CheckoutStep};
pub use config::StorefrontConfig;
pub use error::StorefrontError;
pub use gateway::{CommerceGateway, GatewayError, MedusaClient};
pub use payment::{PaymentConfirmer, StripeConfirmer};
pub use providers::ProviderRegistry;
pub use session_store::{FileSessionStore, SessionStore};
