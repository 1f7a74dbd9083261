//! Larder Core - Shared domain types.
//!
//! This crate provides the value types used across all Larder components:
//! - `storefront` - Remote gateway, projection stores and checkout orchestration
//! - `cli` - Command-line driver for the storefront client
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients, no async.
//! Every constructor that can fail validates its input up front so that the
//! rest of the workspace can rely on the invariants carried by the type.
//!
//! # Modules
//!
//! - [`types`] - Typed IDs, money, quantities, emails and status enums

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
