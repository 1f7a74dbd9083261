//! Wire types for the backing REST service.
//!
//! These mirror the JSON payloads exactly. Field aliases cover the older
//! serializer names the service still emits for some resources.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

use larder_core::{
    CartId, CartItemId, CategoryId, Money, OrderId, OrderLineId, OrderStatus, PaymentMethod,
    ProductId, Quantity, ShippingMethod, UserId,
};

// =============================================================================
// Catalog Types
// =============================================================================

/// Product category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Category ID.
    pub id: CategoryId,
    /// Display name.
    pub name: String,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
}

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Product ID.
    pub id: ProductId,
    /// Product name.
    pub name: String,
    /// Plain text description.
    #[serde(default)]
    pub description: String,
    /// Current unit price.
    pub price: Money,
    /// Units in stock, if tracked.
    #[serde(default)]
    pub stock: Option<u32>,
    /// Image URL.
    #[serde(default)]
    pub image: Option<String>,
    /// Owning category.
    #[serde(default)]
    pub category: Option<CategoryId>,
    /// Average review rating.
    #[serde(default)]
    pub rating: Option<Decimal>,
    /// Number of reviews.
    #[serde(default)]
    pub review_count: Option<u32>,
}

impl Product {
    /// Whether the product can currently be added to a cart.
    #[must_use]
    pub fn in_stock(&self) -> bool {
        self.stock.is_none_or(|stock| stock > 0)
    }
}

/// Query parameters for product listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ProductQuery {
    /// Free-text search term.
    pub search: Option<String>,
}

impl ProductQuery {
    /// A listing filtered by a search term.
    #[must_use]
    pub fn search(term: impl Into<String>) -> Self {
        Self {
            search: Some(term.into()),
        }
    }

    /// Whether this is the unfiltered listing.
    #[must_use]
    pub const fn is_default(&self) -> bool {
        self.search.is_none()
    }
}

// =============================================================================
// Cart Types
// =============================================================================

/// A line in the user's cart.
///
/// The service stores quantities as non-negative integers, so a zero line can
/// appear on the wire. Decoding a single line rejects it; [`Cart`] and
/// [`Order`] skip such lines instead of failing the whole payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    /// Cart item ID.
    pub id: CartItemId,
    /// Referenced product.
    pub product_id: ProductId,
    /// Quantity, always at least one.
    pub quantity: Quantity,
    /// Unit price captured when the item was added.
    #[serde(alias = "product_price")]
    pub price: Money,
    /// Product details expanded by the service, when available.
    #[serde(default)]
    pub product: Option<Product>,
}

impl CartItem {
    /// Unit price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Money {
        self.price * self.quantity
    }

    /// Product name, or a placeholder when the product could not be expanded.
    #[must_use]
    pub fn display_name(&self) -> String {
        self.product
            .as_ref()
            .map_or_else(|| format!("Product #{}", self.product_id), |p| p.name.clone())
    }
}

/// The user's cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    /// Cart ID.
    pub id: CartId,
    /// Owning user.
    pub user_id: UserId,
    /// Creation timestamp.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Last update timestamp.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// Cart lines in server order. Lines with a zero quantity are dropped.
    #[serde(default, deserialize_with = "skip_empty_lines")]
    pub items: Vec<CartItem>,
    /// Server-computed total. Informational only.
    #[serde(default)]
    pub total: Option<Money>,
}

impl Cart {
    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Sum of line totals.
    #[must_use]
    pub fn subtotal(&self) -> Money {
        self.items.iter().map(CartItem::line_total).sum()
    }

    /// Total number of units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.quantity.get())).sum()
    }

    /// Look up a line by ID.
    #[must_use]
    pub fn item(&self, id: CartItemId) -> Option<&CartItem> {
        self.items.iter().find(|item| item.id == id)
    }
}

/// Body of `POST /cart-items/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCartItem {
    /// Target cart.
    pub cart: CartId,
    /// Product to add.
    pub product_id: ProductId,
    /// Units to add. The service merges into an existing line.
    pub quantity: Quantity,
}

/// Body of `PATCH /cart-items/{id}/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItemPatch {
    /// Absolute new quantity.
    pub quantity: Quantity,
}

// =============================================================================
// Order Types
// =============================================================================

/// Immutable snapshot of a product at order time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLineItem {
    /// Line ID.
    pub id: OrderLineId,
    /// Product the line was created from.
    pub product_id: ProductId,
    /// Product name at order time.
    pub product_name: String,
    /// Product image at order time.
    #[serde(default)]
    pub product_image: Option<String>,
    /// Units ordered.
    pub quantity: Quantity,
    /// Unit price at order time.
    pub price: Money,
}

impl OrderLineItem {
    /// Unit price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Money {
        self.price * self.quantity
    }
}

/// A placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Order ID.
    pub id: OrderId,
    /// Public order reference.
    #[serde(default)]
    pub order_id: Option<Uuid>,
    /// Owning user.
    pub user_id: UserId,
    /// Lifecycle status.
    #[serde(alias = "order_status")]
    pub status: OrderStatus,
    /// Authoritative total computed by the service.
    pub total_amount: Money,
    /// Flattened shipping address.
    pub shipping_address: String,
    /// Flattened billing address.
    #[serde(default)]
    pub billing_address: Option<String>,
    /// Shipping method.
    #[serde(default)]
    pub shipping_method: Option<ShippingMethod>,
    /// Payment method.
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
    /// Whether payment has been captured.
    #[serde(default)]
    pub payment_status: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
    /// Line item snapshots. Lines with a zero quantity are dropped.
    #[serde(default, deserialize_with = "skip_empty_lines")]
    pub items: Vec<OrderLineItem>,
}

impl Order {
    /// Whether the client may offer cancellation.
    #[must_use]
    pub const fn can_cancel(&self) -> bool {
        self.status.is_cancellable()
    }

    /// Sum of line snapshots. May differ from `total_amount`, which includes
    /// shipping and tax.
    #[must_use]
    pub fn items_subtotal(&self) -> Money {
        self.items.iter().map(OrderLineItem::line_total).sum()
    }
}

/// Body of `POST /orders/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    /// Ordering user. The service builds lines from this user's cart.
    pub user_id: UserId,
    /// Flattened shipping address.
    pub shipping_address: String,
    /// Shipping method.
    pub shipping_method: ShippingMethod,
    /// Payment method. Raw payment details are never sent.
    pub payment_method: PaymentMethod,
}

/// Decode a line list, dropping lines whose quantity is zero.
fn skip_empty_lines<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let raw = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    let mut lines = Vec::with_capacity(raw.len());
    for value in raw {
        if value.get("quantity").and_then(Value::as_u64) == Some(0) {
            let id = value.get("id").unwrap_or(&Value::Null);
            warn!(line_id = %id, "Skipping zero-quantity line");
            continue;
        }
        lines.push(serde_json::from_value(value).map_err(D::Error::custom)?);
    }
    Ok(lines)
}
