//! Subcommand implementations.
//!
//! Each command drives the storefront stores through [`AppState`] and writes
//! a plain-text rendering of the resulting snapshot to `out`.

pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod orders;

use larder_core::{Email, EmailError, UserId};
use larder_storefront::AppState;
use larder_storefront::api::RemoteError;
use larder_storefront::checkout::CheckoutError;
use larder_storefront::error::ValidationError;
use larder_storefront::session::Identity;
use larder_storefront::stores::{CartState, CatalogState, LoadStatus, OrderState};
use thiserror::Error;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CliError {
    /// A command that needs an identity ran without one.
    #[error("Missing --{0} (or set LARDER_USER_{1})")]
    MissingProfile(&'static str, &'static str),

    #[error("Invalid profile email: {0}")]
    ProfileEmail(#[from] EmailError),

    /// The HTTP client could not be constructed.
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// Input was rejected before anything was sent.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    /// A store settled in the error state.
    #[error("{0}")]
    Store(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Failed to write output: {0}")]
    Output(#[from] std::io::Error),
}

/// Identity flags shared by every command.
#[derive(Debug, Default)]
pub struct Profile {
    pub user_id: Option<i64>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
}

impl Profile {
    /// Build the identity this profile describes.
    pub fn identity(self) -> Result<Identity, CliError> {
        let id = self
            .user_id
            .ok_or(CliError::MissingProfile("user-id", "ID"))?;
        let email = self
            .email
            .ok_or(CliError::MissingProfile("email", "EMAIL"))?;

        Ok(Identity {
            id: UserId::new(id),
            first_name: self.first_name,
            last_name: self.last_name,
            email: Email::parse(&email)?,
            address: self.address,
            phone: self.phone,
        })
    }

    /// Sign the profile's identity into `app`.
    pub fn sign_in(self, app: &AppState) -> Result<(), CliError> {
        app.sign_in(self.identity()?);
        Ok(())
    }
}

/// A store snapshot that may have settled in the error state.
pub trait Settled: Sized {
    fn failure(&self) -> Option<&str>;

    /// Turn an error-state snapshot into `CliError::Store`.
    fn settled(self) -> Result<Self, CliError> {
        match self.failure() {
            Some(detail) => Err(CliError::Store(detail.to_string())),
            None => Ok(self),
        }
    }
}

const UNKNOWN_FAILURE: &str = "Request failed";

impl Settled for CartState {
    fn failure(&self) -> Option<&str> {
        (self.status() == LoadStatus::Error)
            .then(|| self.error_detail().unwrap_or(UNKNOWN_FAILURE))
    }
}

impl Settled for OrderState {
    fn failure(&self) -> Option<&str> {
        (self.status() == LoadStatus::Error)
            .then(|| self.error_detail().unwrap_or(UNKNOWN_FAILURE))
    }
}

impl Settled for CatalogState {
    fn failure(&self) -> Option<&str> {
        (self.status() == LoadStatus::Error)
            .then(|| self.error_detail().unwrap_or(UNKNOWN_FAILURE))
    }
}
