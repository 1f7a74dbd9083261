//! Cache types for catalog responses.

use std::sync::Arc;

use larder_core::{CategoryId, ProductId};

use super::types::{Category, Product};

/// Cache key for catalog reads.
///
/// Search listings are never cached, so the product listing key carries no
/// query.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub enum CacheKey {
    Products,
    Product(ProductId),
    ProductsByCategory(CategoryId),
    Categories,
}

/// Cached value types.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Products(Arc<Vec<Product>>),
    Product(Box<Product>),
    Categories(Arc<Vec<Category>>),
}
