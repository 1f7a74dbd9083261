//! Integration tests for the Larder storefront client.
//!
//! [`FakeService`] runs an in-process stand-in for the backing REST service
//! on an ephemeral port. Tests drive the real `reqwest` gateway, the
//! projection stores and the checkout orchestrator against it, then inspect
//! the fake's server-side state and per-endpoint hit counters.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p larder-integration-tests
//! ```
//!
//! # Seed Data
//!
//! | Product | Name       | Price | Stock | Category   |
//! |---------|------------|-------|-------|------------|
//! | 10      | Rolled Oats| 10.00 | 25    | 1 (Pantry) |
//! | 11      | Green Tea  | 5.00  | 40    | 2 (Drinks) |
//! | 12      | Olive Oil  | 12.50 | 0     | 1 (Pantry) |
//! | 13      | Oat Milk   | 3.25  | 12    | 2 (Drinks) |
//!
//! Orders are charged 10.00 shipping plus 7% tax, matching the client's
//! default pricing.

#![allow(clippy::missing_panics_doc, clippy::must_use_candidate)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::extract::{Path, Query, Request, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use larder_core::{Email, OrderStatus, UserId};
use larder_storefront::session::Identity;
use larder_storefront::{AppState, StorefrontConfig};

/// Resource operations the fake serves, for hit counting and fault injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    UserCart,
    AddItem,
    UpdateItem,
    RemoveItem,
    ClearCart,
    CreateOrder,
    UserOrders,
    Order,
    CancelOrder,
    Products,
    Product,
    ProductsByCategory,
    Categories,
}

/// A canned failure response.
#[derive(Debug, Clone)]
pub struct Fault {
    status: StatusCode,
    body: String,
    content_type: &'static str,
    retry_after: Option<u64>,
}

impl Fault {
    fn json(status: StatusCode, body: &Value) -> Self {
        Self {
            status,
            body: body.to_string(),
            content_type: "application/json",
            retry_after: None,
        }
    }

    fn bad_request(body: &Value) -> Self {
        Self::json(StatusCode::BAD_REQUEST, body)
    }

    fn not_found() -> Self {
        Self::json(StatusCode::NOT_FOUND, &json!({"detail": "Not found."}))
    }
}

impl IntoResponse for Fault {
    fn into_response(self) -> Response {
        let mut response = (self.status, self.body).into_response();
        let headers = response.headers_mut();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(self.content_type),
        );
        if let Some(seconds) = self.retry_after {
            headers.insert(header::RETRY_AFTER, HeaderValue::from(seconds));
        }
        response
    }
}

// =============================================================================
// Server-side State
// =============================================================================

#[derive(Debug, Clone)]
struct ProductRow {
    id: i64,
    name: &'static str,
    price: Decimal,
    stock: u32,
    category: i64,
}

#[derive(Debug, Clone)]
struct LineRow {
    id: i64,
    product_id: i64,
    quantity: u32,
    price: Decimal,
}

#[derive(Debug)]
struct CartRow {
    id: i64,
    user_id: i64,
    items: Vec<LineRow>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug)]
struct OrderRow {
    id: i64,
    reference: Uuid,
    user_id: i64,
    status: OrderStatus,
    total: Decimal,
    shipping_address: String,
    shipping_method: String,
    payment_method: String,
    lines: Vec<LineRow>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug)]
struct Backend {
    categories: Vec<(i64, &'static str)>,
    products: Vec<ProductRow>,
    carts: Vec<CartRow>,
    orders: Vec<OrderRow>,
    next_cart: i64,
    next_line: i64,
    next_order: i64,
    hits: HashMap<Endpoint, usize>,
    faults: HashMap<Endpoint, Fault>,
    token: Option<String>,
}

impl Backend {
    fn seeded() -> Self {
        let product = |id, name, cents, stock, category| ProductRow {
            id,
            name,
            price: Decimal::new(cents, 2),
            stock,
            category,
        };

        Self {
            categories: vec![(1, "Pantry"), (2, "Drinks")],
            products: vec![
                product(10, "Rolled Oats", 1000, 25, 1),
                product(11, "Green Tea", 500, 40, 2),
                product(12, "Olive Oil", 1250, 0, 1),
                product(13, "Oat Milk", 325, 12, 2),
            ],
            carts: Vec::new(),
            orders: Vec::new(),
            next_cart: 1,
            next_line: 1,
            next_order: 501,
            hits: HashMap::new(),
            faults: HashMap::new(),
            token: None,
        }
    }

    /// Count the hit and replay an injected fault, if any.
    fn enter(&mut self, endpoint: Endpoint) -> Result<(), Fault> {
        *self.hits.entry(endpoint).or_default() += 1;
        self.faults.get(&endpoint).cloned().map_or(Ok(()), Err)
    }

    fn product(&self, id: i64) -> Option<&ProductRow> {
        self.products.iter().find(|p| p.id == id)
    }

    /// The user's cart, created on first access.
    fn cart_for(&mut self, user: i64) -> &mut CartRow {
        let index = match self.carts.iter().position(|c| c.user_id == user) {
            Some(index) => index,
            None => {
                self.carts.push(CartRow {
                    id: self.next_cart,
                    user_id: user,
                    items: Vec::new(),
                    updated_at: Utc::now(),
                });
                self.next_cart += 1;
                self.carts.len() - 1
            }
        };
        &mut self.carts[index]
    }

    fn next_line_id(&mut self) -> i64 {
        let id = self.next_line;
        self.next_line += 1;
        id
    }

    fn product_json(product: &ProductRow) -> Value {
        json!({
            "id": product.id,
            "name": product.name,
            "description": format!("{} from the Larder pantry.", product.name),
            "price": money(product.price),
            "stock": product.stock,
            "image": null,
            "category": product.category,
            "rating": "4.5",
            "review_count": 12,
        })
    }

    fn line_json(&self, line: &LineRow) -> Value {
        json!({
            "id": line.id,
            "product_id": line.product_id,
            "quantity": line.quantity,
            "price": money(line.price),
            "product": self.product(line.product_id).map(Self::product_json),
        })
    }

    fn cart_json(&self, cart: &CartRow) -> Value {
        let total: Decimal = cart
            .items
            .iter()
            .map(|line| line.price * Decimal::from(line.quantity))
            .sum();
        json!({
            "id": cart.id,
            "user_id": cart.user_id,
            "created_at": cart.updated_at,
            "updated_at": cart.updated_at,
            "items": cart.items.iter().map(|line| self.line_json(line)).collect::<Vec<_>>(),
            "total": money(total),
        })
    }

    fn order_json(&self, order: &OrderRow) -> Value {
        let items: Vec<Value> = order
            .lines
            .iter()
            .map(|line| {
                json!({
                    "id": line.id,
                    "product_id": line.product_id,
                    "product_name": self.product(line.product_id).map_or("Unknown", |p| p.name),
                    "product_image": null,
                    "quantity": line.quantity,
                    "price": money(line.price),
                })
            })
            .collect();

        json!({
            "id": order.id,
            "order_id": order.reference,
            "user_id": order.user_id,
            "status": order.status.as_str(),
            "total_amount": money(order.total),
            "shipping_address": order.shipping_address,
            "billing_address": null,
            "shipping_method": order.shipping_method,
            "payment_method": order.payment_method,
            "payment_status": false,
            "created_at": order.created_at,
            "updated_at": order.updated_at,
            "items": items,
        })
    }

    fn place_order(&mut self, user: i64, lines: Vec<LineRow>, body: OrderBody) -> i64 {
        let subtotal: Decimal = lines
            .iter()
            .map(|line| line.price * Decimal::from(line.quantity))
            .sum();
        let tax = (subtotal * Decimal::new(7, 2))
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);

        let id = self.next_order;
        self.next_order += 1;
        // Spread timestamps so newest-first ordering is observable.
        let created_at = epoch() + Duration::minutes(id);
        self.orders.push(OrderRow {
            id,
            reference: Uuid::new_v4(),
            user_id: user,
            status: OrderStatus::Pending,
            total: subtotal + Decimal::new(1000, 2) + tax,
            shipping_address: body.shipping_address,
            shipping_method: body.shipping_method,
            payment_method: body.payment_method,
            lines,
            created_at,
            updated_at: created_at,
        });
        id
    }
}

fn money(amount: Decimal) -> String {
    format!("{amount:.2}")
}

fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

#[derive(Clone)]
struct Shared(Arc<Mutex<Backend>>);

impl Shared {
    fn new(backend: Backend) -> Self {
        Self(Arc::new(Mutex::new(backend)))
    }

    fn lock(&self) -> MutexGuard<'_, Backend> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// =============================================================================
// Handlers
// =============================================================================

#[derive(Deserialize)]
struct UserQuery {
    user_id: Option<i64>,
}

#[derive(Deserialize)]
struct CartQuery {
    cart_id: Option<i64>,
}

#[derive(Deserialize)]
struct SearchQuery {
    search: Option<String>,
}

#[derive(Deserialize)]
struct CategoryQuery {
    category_id: Option<i64>,
}

#[derive(Deserialize)]
struct AddItemBody {
    cart: i64,
    product_id: i64,
    quantity: u32,
}

#[derive(Deserialize)]
struct PatchItemBody {
    quantity: u32,
}

#[derive(Deserialize)]
struct OrderBody {
    user_id: i64,
    shipping_address: String,
    shipping_method: String,
    payment_method: String,
}

type Reply = Result<Json<Value>, Fault>;

fn user_required() -> Fault {
    Fault::bad_request(&json!({"error": "user_id is required"}))
}

async fn user_cart(State(shared): State<Shared>, Query(query): Query<UserQuery>) -> Reply {
    let mut backend = shared.lock();
    backend.enter(Endpoint::UserCart)?;
    let user = query.user_id.ok_or_else(user_required)?;

    let cart_id = backend.cart_for(user).id;
    let cart = backend
        .carts
        .iter()
        .find(|c| c.id == cart_id)
        .ok_or_else(Fault::not_found)?;
    Ok(Json(backend.cart_json(cart)))
}

fn stock_error(product: &ProductRow) -> Fault {
    let message = if product.stock == 0 {
        format!("{} is out of stock", product.name)
    } else {
        format!("Only {} items available in stock", product.stock)
    };
    Fault::bad_request(&json!({"quantity": [message]}))
}

async fn add_item(
    State(shared): State<Shared>,
    Json(body): Json<AddItemBody>,
) -> Result<(StatusCode, Json<Value>), Fault> {
    let mut backend = shared.lock();
    backend.enter(Endpoint::AddItem)?;

    let product = backend.product(body.product_id).cloned().ok_or_else(|| {
        Fault::bad_request(&json!({
            "product_id": [format!("Invalid pk \"{}\" - object does not exist.", body.product_id)]
        }))
    })?;
    let line_id = backend.next_line_id();
    let cart = backend
        .carts
        .iter_mut()
        .find(|c| c.id == body.cart)
        .ok_or_else(|| Fault::bad_request(&json!({"cart": ["Invalid cart."]})))?;

    let existing = cart
        .items
        .iter()
        .find(|line| line.product_id == product.id)
        .map_or(0, |line| line.quantity);
    if existing + body.quantity > product.stock {
        return Err(stock_error(&product));
    }

    let line = if let Some(line) = cart.items.iter_mut().find(|l| l.product_id == product.id) {
        line.quantity += body.quantity;
        line.clone()
    } else {
        let line = LineRow {
            id: line_id,
            product_id: product.id,
            quantity: body.quantity,
            price: product.price,
        };
        cart.items.push(line.clone());
        line
    };
    cart.updated_at = Utc::now();

    Ok((StatusCode::CREATED, Json(backend.line_json(&line))))
}

async fn update_item(
    State(shared): State<Shared>,
    Path(id): Path<i64>,
    Json(body): Json<PatchItemBody>,
) -> Reply {
    let mut backend = shared.lock();
    backend.enter(Endpoint::UpdateItem)?;

    let product_id = backend
        .carts
        .iter()
        .flat_map(|c| &c.items)
        .find(|line| line.id == id)
        .map(|line| line.product_id)
        .ok_or_else(Fault::not_found)?;
    let product = backend.product(product_id).cloned().ok_or_else(Fault::not_found)?;
    if body.quantity > product.stock {
        return Err(stock_error(&product));
    }

    let line = backend
        .carts
        .iter_mut()
        .flat_map(|c| c.items.iter_mut())
        .find(|line| line.id == id)
        .ok_or_else(Fault::not_found)?;
    line.quantity = body.quantity;
    let line = line.clone();

    Ok(Json(backend.line_json(&line)))
}

async fn remove_item(State(shared): State<Shared>, Path(id): Path<i64>) -> Result<StatusCode, Fault> {
    let mut backend = shared.lock();
    backend.enter(Endpoint::RemoveItem)?;

    let cart = backend
        .carts
        .iter_mut()
        .find(|c| c.items.iter().any(|line| line.id == id))
        .ok_or_else(Fault::not_found)?;
    cart.items.retain(|line| line.id != id);
    Ok(StatusCode::NO_CONTENT)
}

async fn clear_cart(
    State(shared): State<Shared>,
    Query(query): Query<CartQuery>,
) -> Result<StatusCode, Fault> {
    let mut backend = shared.lock();
    backend.enter(Endpoint::ClearCart)?;
    let cart_id = query
        .cart_id
        .ok_or_else(|| Fault::bad_request(&json!({"error": "cart_id is required"})))?;

    let cart = backend
        .carts
        .iter_mut()
        .find(|c| c.id == cart_id)
        .ok_or_else(Fault::not_found)?;
    cart.items.clear();
    Ok(StatusCode::NO_CONTENT)
}

async fn create_order(
    State(shared): State<Shared>,
    Json(body): Json<OrderBody>,
) -> Result<(StatusCode, Json<Value>), Fault> {
    let mut backend = shared.lock();
    backend.enter(Endpoint::CreateOrder)?;

    if body.shipping_address.trim().is_empty() {
        return Err(Fault::bad_request(
            &json!({"shipping_address": ["This field may not be blank."]}),
        ));
    }
    if !["credit_card", "paypal", "bank_transfer"].contains(&body.payment_method.as_str()) {
        return Err(Fault::bad_request(&json!({
            "payment_method": [format!("\"{}\" is not a valid choice.", body.payment_method)]
        })));
    }

    let user = body.user_id;
    let cart = backend.cart_for(user);
    if cart.items.is_empty() {
        return Err(Fault::bad_request(&json!({"error": "Cart is empty"})));
    }
    let lines = std::mem::take(&mut cart.items);

    let mut snapshot = Vec::with_capacity(lines.len());
    for line in lines {
        snapshot.push(LineRow {
            id: backend.next_line_id(),
            ..line
        });
    }
    let id = backend.place_order(user, snapshot, body);

    let order = backend
        .orders
        .iter()
        .find(|o| o.id == id)
        .ok_or_else(Fault::not_found)?;
    Ok((StatusCode::CREATED, Json(backend.order_json(order))))
}

async fn user_orders(State(shared): State<Shared>, Query(query): Query<UserQuery>) -> Reply {
    let mut backend = shared.lock();
    backend.enter(Endpoint::UserOrders)?;
    let user = query.user_id.ok_or_else(user_required)?;

    let mut orders: Vec<&OrderRow> = backend.orders.iter().filter(|o| o.user_id == user).collect();
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(Json(Value::Array(
        orders.into_iter().map(|o| backend.order_json(o)).collect(),
    )))
}

async fn order(State(shared): State<Shared>, Path(id): Path<i64>) -> Reply {
    let mut backend = shared.lock();
    backend.enter(Endpoint::Order)?;

    let order = backend
        .orders
        .iter()
        .find(|o| o.id == id)
        .ok_or_else(Fault::not_found)?;
    Ok(Json(backend.order_json(order)))
}

async fn cancel_order(State(shared): State<Shared>, Path(id): Path<i64>) -> Reply {
    let mut backend = shared.lock();
    backend.enter(Endpoint::CancelOrder)?;

    let order = backend
        .orders
        .iter_mut()
        .find(|o| o.id == id)
        .ok_or_else(Fault::not_found)?;
    if order.status != OrderStatus::Pending {
        return Err(Fault::bad_request(
            &json!({"error": "Only pending orders can be cancelled"}),
        ));
    }
    order.status = OrderStatus::Cancelled;
    order.updated_at = Utc::now();

    let order = backend
        .orders
        .iter()
        .find(|o| o.id == id)
        .ok_or_else(Fault::not_found)?;
    Ok(Json(backend.order_json(order)))
}

async fn products(State(shared): State<Shared>, Query(query): Query<SearchQuery>) -> Reply {
    let mut backend = shared.lock();
    backend.enter(Endpoint::Products)?;

    let term = query.search.map(|s| s.to_lowercase());
    let products = backend
        .products
        .iter()
        .filter(|p| {
            term.as_deref()
                .is_none_or(|term| p.name.to_lowercase().contains(term))
        })
        .map(Backend::product_json)
        .collect();
    Ok(Json(Value::Array(products)))
}

async fn product(State(shared): State<Shared>, Path(id): Path<i64>) -> Reply {
    let mut backend = shared.lock();
    backend.enter(Endpoint::Product)?;

    let product = backend.product(id).ok_or_else(Fault::not_found)?;
    Ok(Json(Backend::product_json(product)))
}

async fn products_by_category(
    State(shared): State<Shared>,
    Query(query): Query<CategoryQuery>,
) -> Reply {
    let mut backend = shared.lock();
    backend.enter(Endpoint::ProductsByCategory)?;
    let category = query
        .category_id
        .ok_or_else(|| Fault::bad_request(&json!({"error": "category_id is required"})))?;

    let products = backend
        .products
        .iter()
        .filter(|p| p.category == category)
        .map(Backend::product_json)
        .collect();
    Ok(Json(Value::Array(products)))
}

async fn categories(State(shared): State<Shared>) -> Reply {
    let mut backend = shared.lock();
    backend.enter(Endpoint::Categories)?;

    let categories = backend
        .categories
        .iter()
        .map(|(id, name)| json!({"id": id, "name": name, "description": null}))
        .collect();
    Ok(Json(Value::Array(categories)))
}

/// Reject requests without the configured bearer token.
async fn require_token(State(shared): State<Shared>, request: Request, next: Next) -> Response {
    let expected = shared.lock().token.clone();
    if let Some(token) = expected {
        let presented = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok());
        if presented != Some(format!("Bearer {token}").as_str()) {
            return Fault::json(
                StatusCode::UNAUTHORIZED,
                &json!({"detail": "Authentication credentials were not provided."}),
            )
            .into_response();
        }
    }
    next.run(request).await
}

fn router(shared: Shared) -> Router {
    let api = Router::new()
        .route("/carts/user/", get(user_cart))
        .route("/cart-items/", post(add_item))
        .route("/cart-items/clear_cart/", delete(clear_cart))
        .route("/cart-items/{id}/", patch(update_item).delete(remove_item))
        .route("/orders/", post(create_order))
        .route("/orders/user_orders/", get(user_orders))
        .route("/orders/{id}/", get(order))
        .route("/orders/{id}/cancel/", post(cancel_order))
        .route("/products/", get(products))
        .route("/products/by_category/", get(products_by_category))
        .route("/products/{id}/", get(product))
        .route("/categories/", get(categories))
        .route_layer(middleware::from_fn_with_state(shared.clone(), require_token))
        .with_state(shared);

    Router::new().nest("/api", api)
}

// =============================================================================
// Test Harness
// =============================================================================

/// A running fake of the backing service.
pub struct FakeService {
    addr: SocketAddr,
    shared: Shared,
}

impl FakeService {
    /// Start the fake with the seed catalog and no carts or orders.
    pub async fn spawn() -> Self {
        Self::start(Backend::seeded()).await
    }

    /// Start the fake requiring `Authorization: Bearer {token}` on every request.
    pub async fn spawn_with_token(token: &str) -> Self {
        let mut backend = Backend::seeded();
        backend.token = Some(token.to_string());
        Self::start(backend).await
    }

    async fn start(backend: Backend) -> Self {
        let shared = Shared::new(backend);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fake service");
        let addr = listener.local_addr().expect("Failed to read local address");

        let app = router(shared.clone());
        tokio::spawn(async move {
            axum::serve(listener, app)
                .await
                .expect("Fake service stopped");
        });

        Self { addr, shared }
    }

    /// Service root as the client expects it.
    pub fn base_url(&self) -> String {
        format!("http://{}/api/", self.addr)
    }

    /// Client configuration pointing at this fake, plus extra variables.
    pub fn config_with(&self, vars: &[(&str, &str)]) -> StorefrontConfig {
        let base_url = self.base_url();
        StorefrontConfig::from_lookup(|key| {
            if key == "LARDER_API_URL" {
                return Some(base_url.clone());
            }
            vars.iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| (*value).to_string())
        })
        .expect("Invalid test configuration")
    }

    pub fn config(&self) -> StorefrontConfig {
        self.config_with(&[])
    }

    /// Application state talking to this fake, nobody signed in.
    pub fn app(&self) -> AppState {
        AppState::new(self.config()).expect("Failed to build gateway")
    }

    /// Application state with `user` signed in.
    pub fn signed_in_app(&self, user: i64) -> AppState {
        let app = self.app();
        app.sign_in(identity(user));
        app
    }

    /// Number of requests `endpoint` has received.
    pub fn hits(&self, endpoint: Endpoint) -> usize {
        self.shared
            .lock()
            .hits
            .get(&endpoint)
            .copied()
            .unwrap_or_default()
    }

    /// Answer every request to `endpoint` with `status` and a JSON `body`.
    pub fn fail(&self, endpoint: Endpoint, status: u16, body: &Value) {
        let status = StatusCode::from_u16(status).expect("Invalid status code");
        self.shared
            .lock()
            .faults
            .insert(endpoint, Fault::json(status, body));
    }

    /// Answer every request to `endpoint` with an HTML error page.
    pub fn fail_html(&self, endpoint: Endpoint, status: u16) {
        let status = StatusCode::from_u16(status).expect("Invalid status code");
        self.shared.lock().faults.insert(
            endpoint,
            Fault {
                status,
                body: "<html><body><h1>Server Error</h1></body></html>".to_string(),
                content_type: "text/html",
                retry_after: None,
            },
        );
    }

    /// Answer every request to `endpoint` with 429 and `Retry-After`.
    pub fn rate_limit(&self, endpoint: Endpoint, retry_after: u64) {
        self.shared.lock().faults.insert(
            endpoint,
            Fault {
                retry_after: Some(retry_after),
                ..Fault::json(
                    StatusCode::TOO_MANY_REQUESTS,
                    &json!({"detail": "Request was throttled."}),
                )
            },
        );
    }

    /// Stop injecting faults on `endpoint`.
    pub fn recover(&self, endpoint: Endpoint) {
        self.shared.lock().faults.remove(&endpoint);
    }

    /// Put `(product, quantity)` lines in `user`'s server-side cart.
    pub fn seed_cart(&self, user: i64, lines: &[(i64, u32)]) -> i64 {
        let mut backend = self.shared.lock();
        let mut rows = Vec::with_capacity(lines.len());
        for &(product_id, quantity) in lines {
            let price = backend
                .product(product_id)
                .map(|p| p.price)
                .expect("Unknown seed product");
            rows.push(LineRow {
                id: backend.next_line_id(),
                product_id,
                quantity,
                price,
            });
        }
        let cart = backend.cart_for(user);
        cart.items.extend(rows);
        cart.id
    }

    /// Create an order for `user` directly on the server.
    pub fn seed_order(&self, user: i64, status: OrderStatus) -> i64 {
        let mut backend = self.shared.lock();
        let line = LineRow {
            id: backend.next_line_id(),
            product_id: 11,
            quantity: 2,
            price: Decimal::new(500, 2),
        };
        let id = backend.place_order(
            user,
            vec![line],
            OrderBody {
                user_id: user,
                shipping_address: "1 Main St, Springfield, IL, 62701, US".to_string(),
                shipping_method: "standard".to_string(),
                payment_method: "paypal".to_string(),
            },
        );
        if let Some(order) = backend.orders.iter_mut().find(|o| o.id == id) {
            order.status = status;
        }
        id
    }

    /// Move an order along as fulfillment would.
    pub fn set_order_status(&self, id: i64, status: OrderStatus) {
        if let Some(order) = self.shared.lock().orders.iter_mut().find(|o| o.id == id) {
            order.status = status;
        }
    }

    /// Server-side status of an order.
    pub fn order_status(&self, id: i64) -> Option<OrderStatus> {
        self.shared
            .lock()
            .orders
            .iter()
            .find(|o| o.id == id)
            .map(|o| o.status)
    }

    /// `(product, quantity)` lines in `user`'s server-side cart.
    pub fn cart_lines(&self, user: i64) -> Vec<(i64, u32)> {
        self.shared
            .lock()
            .carts
            .iter()
            .find(|c| c.user_id == user)
            .map(|c| c.items.iter().map(|l| (l.product_id, l.quantity)).collect())
            .unwrap_or_default()
    }
}

/// Profile used for signed-in tests.
pub fn identity(user: i64) -> Identity {
    Identity {
        id: UserId::new(user),
        first_name: Some("Ada".to_string()),
        last_name: Some("Lovelace".to_string()),
        email: Email::parse("ada@example.com").expect("valid email"),
        address: Some("1 Main St".to_string()),
        phone: Some("555-0100".to_string()),
    }
}
