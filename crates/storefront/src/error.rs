//! Local validation errors and Sentry helpers.
//!
//! `ValidationError` covers everything that can be rejected before a request
//! is dispatched. Remote failures are a separate type
//! ([`RemoteError`](crate::api::RemoteError)) and never escape a projection
//! store; they land in the store's `error_detail` instead.

use thiserror::Error;

use larder_core::{CartItemId, EmailError, OrderId, OrderStatus, QuantityError};

/// Input rejected before reaching the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Quantity below one or out of range.
    #[error(transparent)]
    Quantity(#[from] QuantityError),

    /// Malformed email address.
    #[error("Invalid email address: {0}")]
    Email(#[from] EmailError),

    #[error("Password is required")]
    PasswordMissing,

    #[error("Password must be at least {min} characters")]
    PasswordTooShort { min: usize },

    #[error("Passwords do not match")]
    PasswordMismatch,

    /// Required checkout or form fields left blank.
    #[error("Please fill in all required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    /// Card details missing or malformed.
    #[error("Invalid card details: {0}")]
    Card(&'static str),

    #[error("Your cart is empty")]
    EmptyCart,

    /// The line is not in the cached cart, so there is nothing to step from.
    #[error("Cart item {0} is not in the cart")]
    UnknownCartItem(CartItemId),

    /// Cancellation requested for an order that is past `pending`.
    #[error("Order {order} cannot be cancelled while {status}")]
    NotCancellable { order: OrderId, status: OrderStatus },
}

/// Set the Sentry user context from a user ID.
///
/// Call this after sign-in to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Add item", Some(&[("product_id", "10")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
