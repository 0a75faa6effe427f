//! Medusa Store Core - Shared types library.
//!
//! This crate provides the domain vocabulary shared by the storefront library
//! and the command-line front-end:
//! - `storefront` - Cart session manager, checkout orchestrator, API clients
//! - `cli` - Terminal front-end driving the storefront core
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients, no storage.
//! This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, money, emails, and statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
