//! Larder storefront client library.
//!
//! Keeps a local projection of a user's cart and orders consistent with the
//! backing REST service, and drives the checkout wizard that turns a cart
//! into an order. Rendering is left to the caller; everything here is
//! snapshot state plus async commands.
//!
//! # Layers
//!
//! - [`api`] - typed gateway to the service (`reqwest`, catalog cache)
//! - [`stores`] - cart, order and catalog projections
//! - [`checkout`] - step machine, draft validation, advisory totals
//! - [`session`] - signed-in identity, credential forms, session gate
//! - [`state`] - application context tying it together

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod checkout;
pub mod config;
pub mod error;
pub mod routes;
pub mod session;
pub mod state;
pub mod stores;

pub use config::StorefrontConfig;
pub use state::AppState;
