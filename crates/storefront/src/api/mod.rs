//! Remote store gateway for the backing REST service.
//!
//! # Architecture
//!
//! - One method per resource operation, typed parameters and payloads
//! - The service is the source of truth - nothing here merges or patches
//!   local state, that is the projection stores' job
//! - Catalog reads are cached in-process via `moka`; cart and order reads
//!   never are
//! - No retries at this layer. Callers decide whether to try again.
//!
//! # Example
//!
//! ```rust,ignore
//! use larder_storefront::api::{RestGateway, StoreGateway};
//!
//! let gateway = RestGateway::new(&config.api)?;
//! let cart = gateway.fetch_user_cart(user_id).await?;
//! ```

mod cache;
mod client;
#[cfg(test)]
pub(crate) mod testing;
pub mod types;

use std::fmt;
use std::future::Future;

use thiserror::Error;

use larder_core::{CartId, CartItemId, CategoryId, OrderId, ProductId, Quantity, UserId};

pub use client::RestGateway;
pub use types::*;

/// Typed access to every resource operation of the backing service.
///
/// Implemented by [`RestGateway`] for production and by in-memory fakes in
/// tests. Every failure, HTTP or transport, surfaces as a [`RemoteError`].
pub trait StoreGateway: Send + Sync + 'static {
    /// `GET /carts/user/?user_id=` - the service creates the cart on first access.
    fn fetch_user_cart(&self, user: UserId)
    -> impl Future<Output = Result<Cart, RemoteError>> + Send;

    /// `POST /cart-items/`.
    fn add_cart_item(
        &self,
        item: &NewCartItem,
    ) -> impl Future<Output = Result<CartItem, RemoteError>> + Send;

    /// `PATCH /cart-items/{id}/` with the absolute quantity.
    fn update_cart_item(
        &self,
        item: CartItemId,
        quantity: Quantity,
    ) -> impl Future<Output = Result<CartItem, RemoteError>> + Send;

    /// `DELETE /cart-items/{id}/`.
    fn remove_cart_item(
        &self,
        item: CartItemId,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send;

    /// `DELETE /cart-items/clear_cart/?cart_id=`.
    fn clear_cart(&self, cart: CartId) -> impl Future<Output = Result<(), RemoteError>> + Send;

    /// `POST /orders/`.
    fn create_order(
        &self,
        request: &CreateOrderRequest,
    ) -> impl Future<Output = Result<Order, RemoteError>> + Send;

    /// `GET /orders/user_orders/?user_id=`, most recent first.
    fn fetch_user_orders(
        &self,
        user: UserId,
    ) -> impl Future<Output = Result<Vec<Order>, RemoteError>> + Send;

    /// `GET /orders/{id}/`.
    fn fetch_order(&self, order: OrderId)
    -> impl Future<Output = Result<Order, RemoteError>> + Send;

    /// `POST /orders/{id}/cancel/`.
    fn cancel_order(
        &self,
        order: OrderId,
    ) -> impl Future<Output = Result<Order, RemoteError>> + Send;

    /// `GET /products/`.
    fn fetch_products(
        &self,
        query: &ProductQuery,
    ) -> impl Future<Output = Result<Vec<Product>, RemoteError>> + Send;

    /// `GET /products/{id}/`.
    fn fetch_product(
        &self,
        product: ProductId,
    ) -> impl Future<Output = Result<Product, RemoteError>> + Send;

    /// `GET /products/by_category/?category_id=`.
    fn fetch_products_by_category(
        &self,
        category: CategoryId,
    ) -> impl Future<Output = Result<Vec<Product>, RemoteError>> + Send;

    /// `GET /categories/`.
    fn fetch_categories(&self) -> impl Future<Output = Result<Vec<Category>, RemoteError>> + Send;
}

/// Errors that can occur when talking to the backing service.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The request never produced a response.
    #[error("HTTP error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The service answered 429.
    #[error("Rate limited, retry after {retry_after} seconds")]
    RateLimited {
        /// Seconds from the `Retry-After` header (defaults to 1).
        retry_after: u64,
    },

    /// The service answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: ErrorBody,
    },

    /// A success response could not be decoded.
    #[error("JSON parse error: {0}")]
    Decode(#[from] serde_json::Error),

    /// The request URL could not be built.
    #[error("Invalid request URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The configured API token cannot be sent as a header.
    #[error("Invalid API token: {0}")]
    InvalidToken(#[from] reqwest::header::InvalidHeaderValue),
}

impl RemoteError {
    /// HTTP status of the failed response, if there was one.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::RateLimited { .. } => Some(429),
            Self::Transport(_) | Self::Decode(_) | Self::InvalidUrl(_) | Self::InvalidToken(_) => {
                None
            }
        }
    }

    /// Plain-language message for an inline alert.
    ///
    /// Uses the service's own message when the body is structured and
    /// carries one, otherwise `fallback`.
    #[must_use]
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            Self::Status { body, .. } => body.message().unwrap_or_else(|| fallback.to_string()),
            Self::RateLimited { retry_after } => {
                format!("Too many requests, please try again in {retry_after} seconds")
            }
            Self::Transport(_)
            | Self::Decode(_)
            | Self::InvalidUrl(_)
            | Self::InvalidToken(_) => fallback.to_string(),
        }
    }
}

/// Body of a failed response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorBody {
    /// The body was valid JSON.
    Structured(serde_json::Value),
    /// The body was something else (HTML error page, plain text).
    Text(String),
    /// No body at all.
    Empty,
}

impl ErrorBody {
    /// Classify a raw response body.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        if text.trim().is_empty() {
            return Self::Empty;
        }
        serde_json::from_str(text).map_or_else(|_| Self::Text(text.to_string()), Self::Structured)
    }

    /// Extract a human-readable message from a structured body.
    ///
    /// Understands the shapes the service produces: `{"error": ..}`,
    /// `{"detail": ..}`, `{"message": ..}`, `{"non_field_errors": [..]}`,
    /// field error maps (`{"quantity": ["..."]}`) and bare string lists.
    #[must_use]
    pub fn message(&self) -> Option<String> {
        match self {
            Self::Structured(value) => message_from_value(value),
            Self::Text(_) | Self::Empty => None,
        }
    }
}

impl fmt::Display for ErrorBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Structured(value) => write!(f, "{value}"),
            Self::Text(text) => f.write_str(&text.chars().take(200).collect::<String>()),
            Self::Empty => f.write_str("(empty body)"),
        }
    }
}

fn message_from_value(value: &serde_json::Value) -> Option<String> {
    use serde_json::Value;

    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(message_from_value).collect();
            (!parts.is_empty()).then(|| parts.join("; "))
        }
        Value::Object(map) => {
            for key in ["error", "detail", "message", "non_field_errors"] {
                if let Some(message) = map.get(key).and_then(message_from_value) {
                    return Some(message);
                }
            }
            let parts: Vec<String> = map
                .iter()
                .filter_map(|(field, v)| message_from_value(v).map(|m| format!("{field}: {m}")))
                .collect();
            (!parts.is_empty()).then(|| parts.join("; "))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn status_error(body: &str) -> RemoteError {
        RemoteError::Status {
            status: 400,
            body: ErrorBody::parse(body),
        }
    }

    #[test]
    fn test_remote_error_display() {
        let err = RemoteError::RateLimited { retry_after: 60 };
        assert_eq!(err.to_string(), "Rate limited, retry after 60 seconds");
        assert_eq!(err.status(), Some(429));
    }

    #[test]
    fn test_error_body_classification() {
        assert_eq!(ErrorBody::parse(""), ErrorBody::Empty);
        assert_eq!(
            ErrorBody::parse("<html>boom</html>"),
            ErrorBody::Text("<html>boom</html>".to_string())
        );
        assert_eq!(
            ErrorBody::parse(r#"{"error":"x"}"#),
            ErrorBody::Structured(json!({"error": "x"}))
        );
    }

    #[test]
    fn test_user_message_prefers_service_message() {
        let err = status_error(r#"{"error": "user_id is required"}"#);
        assert_eq!(err.user_message("Failed to fetch cart"), "user_id is required");

        let err = status_error(r#"{"detail": "Not found."}"#);
        assert_eq!(err.user_message("Failed to fetch order"), "Not found.");

        let err = status_error(r#"["Cart is empty"]"#);
        assert_eq!(err.user_message("Failed to create order"), "Cart is empty");
    }

    #[test]
    fn test_user_message_formats_field_errors() {
        let err = status_error(r#"{"quantity": ["Ensure this value is less than or equal to 5."]}"#);
        assert_eq!(
            err.user_message("Failed to update cart item"),
            "quantity: Ensure this value is less than or equal to 5."
        );
    }

    #[test]
    fn test_user_message_falls_back_for_unstructured_bodies() {
        let err = status_error("Internal Server Error");
        assert_eq!(err.user_message("Failed to fetch cart"), "Failed to fetch cart");

        let err = status_error("");
        assert_eq!(err.user_message("Failed to clear cart"), "Failed to clear cart");

        let err = status_error(r#"{"code": 17}"#);
        assert_eq!(err.user_message("Failed to clear cart"), "Failed to clear cart");
    }
}
