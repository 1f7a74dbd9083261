//! `reqwest` implementation of the store gateway.

use std::sync::Arc;

use moka::future::Cache;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Method, StatusCode};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;

use larder_core::{CartId, CartItemId, CategoryId, OrderId, ProductId, Quantity, UserId};

use super::cache::{CacheKey, CacheValue};
use super::{
    Cart, CartItem, CartItemPatch, Category, CreateOrderRequest, ErrorBody, NewCartItem, Order,
    Product, ProductQuery, RemoteError, StoreGateway,
};
use crate::config::ApiConfig;

/// Client for the backing REST service.
///
/// Cheaply cloneable. Catalog reads are cached for the configured TTL; cart
/// and order operations always hit the service.
#[derive(Clone)]
pub struct RestGateway {
    inner: Arc<RestGatewayInner>,
}

struct RestGatewayInner {
    client: reqwest::Client,
    base_url: Url,
    cache: Cache<CacheKey, CacheValue>,
}

impl RestGateway {
    /// Create a new gateway.
    ///
    /// # Errors
    ///
    /// Returns an error if the API token is not a valid header value or the
    /// HTTP client fails to build.
    pub fn new(config: &ApiConfig) -> Result<Self, RemoteError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = &config.token {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;

        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(config.catalog_cache_ttl)
            .build();

        Ok(Self {
            inner: Arc::new(RestGatewayInner {
                client,
                base_url: config.base_url.clone(),
                cache,
            }),
        })
    }

    /// The service root every resource path is resolved against.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Drop every cached catalog response.
    pub async fn invalidate_catalog(&self) {
        self.inner.cache.invalidate_all();
        self.inner.cache.run_pending_tasks().await;
    }

    fn endpoint(&self, path: &str, query: &[(&str, String)]) -> Result<Url, RemoteError> {
        let mut url = self.inner.base_url.join(path)?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> reqwest::RequestBuilder {
        self.inner.client.request(method, url)
    }

    /// Send a request and decode the JSON body.
    async fn execute<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, RemoteError> {
        let text = self.send(request).await?;

        serde_json::from_str(&text).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %text.chars().take(500).collect::<String>(),
                "Failed to decode service response"
            );
            RemoteError::Decode(e)
        })
    }

    /// Send a request whose success body carries nothing we need.
    async fn execute_empty(&self, request: reqwest::RequestBuilder) -> Result<(), RemoteError> {
        self.send(request).await.map(|_| ())
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<String, RemoteError> {
        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(RemoteError::RateLimited { retry_after });
        }

        let text = response.text().await?;

        if !status.is_success() {
            tracing::warn!(
                status = %status,
                body = %text.chars().take(500).collect::<String>(),
                "Service returned non-success status"
            );
            return Err(RemoteError::Status {
                status: status.as_u16(),
                body: ErrorBody::parse(&text),
            });
        }

        Ok(text)
    }
}

impl StoreGateway for RestGateway {
    // =========================================================================
    // Cart Methods (not cached - mutable state)
    // =========================================================================

    #[instrument(skip(self), fields(user_id = %user))]
    async fn fetch_user_cart(&self, user: UserId) -> Result<Cart, RemoteError> {
        let url = self.endpoint("carts/user/", &[("user_id", user.to_string())])?;
        self.execute(self.request(Method::GET, url)).await
    }

    #[instrument(skip(self), fields(cart_id = %item.cart, product_id = %item.product_id))]
    async fn add_cart_item(&self, item: &NewCartItem) -> Result<CartItem, RemoteError> {
        let url = self.endpoint("cart-items/", &[])?;
        self.execute(self.request(Method::POST, url).json(item)).await
    }

    #[instrument(skip(self), fields(item_id = %item, quantity = %quantity))]
    async fn update_cart_item(
        &self,
        item: CartItemId,
        quantity: Quantity,
    ) -> Result<CartItem, RemoteError> {
        let url = self.endpoint(&format!("cart-items/{item}/"), &[])?;
        let patch = CartItemPatch { quantity };
        self.execute(self.request(Method::PATCH, url).json(&patch))
            .await
    }

    #[instrument(skip(self), fields(item_id = %item))]
    async fn remove_cart_item(&self, item: CartItemId) -> Result<(), RemoteError> {
        let url = self.endpoint(&format!("cart-items/{item}/"), &[])?;
        self.execute_empty(self.request(Method::DELETE, url)).await
    }

    #[instrument(skip(self), fields(cart_id = %cart))]
    async fn clear_cart(&self, cart: CartId) -> Result<(), RemoteError> {
        let url = self.endpoint("cart-items/clear_cart/", &[("cart_id", cart.to_string())])?;
        self.execute_empty(self.request(Method::DELETE, url)).await
    }

    // =========================================================================
    // Order Methods (not cached)
    // =========================================================================

    #[instrument(skip(self, request), fields(user_id = %request.user_id))]
    async fn create_order(&self, request: &CreateOrderRequest) -> Result<Order, RemoteError> {
        let url = self.endpoint("orders/", &[])?;
        self.execute(self.request(Method::POST, url).json(request))
            .await
    }

    #[instrument(skip(self), fields(user_id = %user))]
    async fn fetch_user_orders(&self, user: UserId) -> Result<Vec<Order>, RemoteError> {
        let url = self.endpoint("orders/user_orders/", &[("user_id", user.to_string())])?;
        self.execute(self.request(Method::GET, url)).await
    }

    #[instrument(skip(self), fields(order_id = %order))]
    async fn fetch_order(&self, order: OrderId) -> Result<Order, RemoteError> {
        let url = self.endpoint(&format!("orders/{order}/"), &[])?;
        self.execute(self.request(Method::GET, url)).await
    }

    #[instrument(skip(self), fields(order_id = %order))]
    async fn cancel_order(&self, order: OrderId) -> Result<Order, RemoteError> {
        let url = self.endpoint(&format!("orders/{order}/cancel/"), &[])?;
        self.execute(self.request(Method::POST, url)).await
    }

    // =========================================================================
    // Catalog Methods (cached)
    // =========================================================================

    #[instrument(skip(self))]
    async fn fetch_products(&self, query: &ProductQuery) -> Result<Vec<Product>, RemoteError> {
        // Only the unfiltered listing is cached
        if query.is_default()
            && let Some(CacheValue::Products(products)) =
                self.inner.cache.get(&CacheKey::Products).await
        {
            debug!("Cache hit for products");
            return Ok(products.as_ref().clone());
        }

        let params: Vec<(&str, String)> = query
            .search
            .iter()
            .map(|term| ("search", term.clone()))
            .collect();
        let url = self.endpoint("products/", &params)?;
        let products: Vec<Product> = self.execute(self.request(Method::GET, url)).await?;

        if query.is_default() {
            self.inner
                .cache
                .insert(CacheKey::Products, CacheValue::Products(Arc::new(products.clone())))
                .await;
        }

        Ok(products)
    }

    #[instrument(skip(self), fields(product_id = %product))]
    async fn fetch_product(&self, product: ProductId) -> Result<Product, RemoteError> {
        let key = CacheKey::Product(product);
        if let Some(CacheValue::Product(cached)) = self.inner.cache.get(&key).await {
            debug!("Cache hit for product");
            return Ok(*cached);
        }

        let url = self.endpoint(&format!("products/{product}/"), &[])?;
        let fetched: Product = self.execute(self.request(Method::GET, url)).await?;

        self.inner
            .cache
            .insert(key, CacheValue::Product(Box::new(fetched.clone())))
            .await;

        Ok(fetched)
    }

    #[instrument(skip(self), fields(category_id = %category))]
    async fn fetch_products_by_category(
        &self,
        category: CategoryId,
    ) -> Result<Vec<Product>, RemoteError> {
        let key = CacheKey::ProductsByCategory(category);
        if let Some(CacheValue::Products(products)) = self.inner.cache.get(&key).await {
            debug!("Cache hit for category products");
            return Ok(products.as_ref().clone());
        }

        let url = self.endpoint(
            "products/by_category/",
            &[("category_id", category.to_string())],
        )?;
        let products: Vec<Product> = self.execute(self.request(Method::GET, url)).await?;

        self.inner
            .cache
            .insert(key, CacheValue::Products(Arc::new(products.clone())))
            .await;

        Ok(products)
    }

    #[instrument(skip(self))]
    async fn fetch_categories(&self) -> Result<Vec<Category>, RemoteError> {
        if let Some(CacheValue::Categories(categories)) =
            self.inner.cache.get(&CacheKey::Categories).await
        {
            debug!("Cache hit for categories");
            return Ok(categories.as_ref().clone());
        }

        let url = self.endpoint("categories/", &[])?;
        let categories: Vec<Category> = self.execute(self.request(Method::GET, url)).await?;

        self.inner
            .cache
            .insert(
                CacheKey::Categories,
                CacheValue::Categories(Arc::new(categories.clone())),
            )
            .await;

        Ok(categories)
    }
}
