//! In-memory gateway for unit tests.
//!
//! Keeps a tiny server-side model (one cart, a list of orders, a catalog),
//! counts every call per operation, and lets tests inject failures or hold
//! responses behind a gate to reproduce out-of-order completions.

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use chrono::{TimeZone, Utc};
use tokio::sync::oneshot;

use larder_core::{
    CartId, CartItemId, CategoryId, Money, OrderId, OrderLineId, OrderStatus, ProductId,
    Quantity, UserId,
};

use super::{
    Cart, CartItem, Category, CreateOrderRequest, ErrorBody, NewCartItem, Order, OrderLineItem,
    Product, ProductQuery, RemoteError, StoreGateway,
};

/// Gateway operation, for call counting and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    FetchCart,
    AddItem,
    UpdateItem,
    RemoveItem,
    ClearCart,
    CreateOrder,
    FetchOrders,
    FetchOrder,
    CancelOrder,
    FetchProducts,
    FetchProduct,
    FetchProductsByCategory,
    FetchCategories,
}

struct Gated {
    gate: oneshot::Receiver<()>,
    cart: Cart,
}

struct FakeState {
    calls: HashMap<Op, usize>,
    failures: HashMap<Op, (u16, String)>,
    scripted_carts: VecDeque<Gated>,
    holds: HashMap<Op, oneshot::Receiver<()>>,
    cart: Cart,
    orders: Vec<Order>,
    products: Vec<Product>,
    categories: Vec<Category>,
    next_item: i64,
    next_order: i64,
}

pub struct FakeGateway {
    state: Mutex<FakeState>,
}

impl FakeGateway {
    /// Gateway whose server cart holds the standard two-line fixture.
    pub fn new() -> Self {
        Self::with_cart(fixtures::cart())
    }

    pub fn with_cart(cart: Cart) -> Self {
        Self {
            state: Mutex::new(FakeState {
                calls: HashMap::new(),
                failures: HashMap::new(),
                scripted_carts: VecDeque::new(),
                holds: HashMap::new(),
                cart,
                orders: Vec::new(),
                products: vec![fixtures::oats(), fixtures::tea()],
                categories: vec![Category {
                    id: CategoryId::new(1),
                    name: "Pantry".to_string(),
                    description: None,
                }],
                next_item: 100,
                next_order: 500,
            }),
        }
    }

    /// Number of times `op` was called.
    pub fn calls(&self, op: Op) -> usize {
        self.state.lock().unwrap().calls.get(&op).copied().unwrap_or(0)
    }

    /// Make every subsequent `op` fail with `status` and `body`.
    pub fn fail(&self, op: Op, status: u16, body: &str) {
        self.state
            .lock()
            .unwrap()
            .failures
            .insert(op, (status, body.to_string()));
    }

    pub fn recover(&self, op: Op) {
        self.state.lock().unwrap().failures.remove(&op);
    }

    /// Answer the next cart fetch with `cart`, but only once the returned
    /// sender fires.
    pub fn hold_next_cart(&self, cart: Cart) -> oneshot::Sender<()> {
        let (tx, gate) = oneshot::channel();
        self.state
            .lock()
            .unwrap()
            .scripted_carts
            .push_back(Gated { gate, cart });
        tx
    }

    /// Hold the next `op` until the returned sender fires. Supported for
    /// order creation, order listing and cancellation.
    pub fn hold(&self, op: Op) -> oneshot::Sender<()> {
        let (tx, gate) = oneshot::channel();
        self.state.lock().unwrap().holds.insert(op, gate);
        tx
    }

    async fn wait(&self, op: Op) {
        let gate = self.state.lock().unwrap().holds.remove(&op);
        if let Some(gate) = gate {
            let _ = gate.await;
        }
    }

    pub fn server_cart(&self) -> Cart {
        self.state.lock().unwrap().cart.clone()
    }

    pub fn insert_order(&self, order: Order) {
        self.state.lock().unwrap().orders.push(order);
    }

    pub fn set_order_status(&self, id: OrderId, status: OrderStatus) {
        let mut state = self.state.lock().unwrap();
        if let Some(order) = state.orders.iter_mut().find(|o| o.id == id) {
            order.status = status;
        }
    }

    fn record(&self, op: Op) -> Result<(), RemoteError> {
        let mut state = self.state.lock().unwrap();
        *state.calls.entry(op).or_default() += 1;
        match state.failures.get(&op) {
            Some((status, body)) => Err(RemoteError::Status {
                status: *status,
                body: ErrorBody::parse(body),
            }),
            None => Ok(()),
        }
    }
}

fn not_found() -> RemoteError {
    RemoteError::Status {
        status: 404,
        body: ErrorBody::parse(r#"{"detail": "Not found."}"#),
    }
}

impl StoreGateway for FakeGateway {
    async fn fetch_user_cart(&self, user: UserId) -> Result<Cart, RemoteError> {
        self.record(Op::FetchCart)?;
        let scripted = {
            let mut state = self.state.lock().unwrap();
            if state.cart.user_id != user {
                return Err(not_found());
            }
            state.scripted_carts.pop_front()
        };
        match scripted {
            Some(Gated { gate, cart }) => {
                let _ = gate.await;
                Ok(cart)
            }
            None => Ok(self.server_cart()),
        }
    }

    async fn add_cart_item(&self, item: &NewCartItem) -> Result<CartItem, RemoteError> {
        self.record(Op::AddItem)?;
        let mut state = self.state.lock().unwrap();
        if state.cart.id != item.cart {
            return Err(not_found());
        }
        let product = state
            .products
            .iter()
            .find(|p| p.id == item.product_id)
            .cloned()
            .ok_or_else(not_found)?;

        if let Some(existing) = state
            .cart
            .items
            .iter_mut()
            .find(|line| line.product_id == item.product_id)
        {
            existing.quantity =
                Quantity::new(i64::from(existing.quantity.get()) + i64::from(item.quantity.get()))
                    .unwrap();
            return Ok(existing.clone());
        }

        state.next_item += 1;
        let line = CartItem {
            id: CartItemId::new(state.next_item),
            product_id: product.id,
            quantity: item.quantity,
            price: product.price,
            product: Some(product),
        };
        state.cart.items.push(line.clone());
        Ok(line)
    }

    async fn update_cart_item(
        &self,
        item: CartItemId,
        quantity: Quantity,
    ) -> Result<CartItem, RemoteError> {
        self.record(Op::UpdateItem)?;
        let mut state = self.state.lock().unwrap();
        let line = state
            .cart
            .items
            .iter_mut()
            .find(|line| line.id == item)
            .ok_or_else(not_found)?;
        line.quantity = quantity;
        Ok(line.clone())
    }

    async fn remove_cart_item(&self, item: CartItemId) -> Result<(), RemoteError> {
        self.record(Op::RemoveItem)?;
        let mut state = self.state.lock().unwrap();
        let before = state.cart.items.len();
        state.cart.items.retain(|line| line.id != item);
        if state.cart.items.len() == before {
            return Err(not_found());
        }
        Ok(())
    }

    async fn clear_cart(&self, cart: CartId) -> Result<(), RemoteError> {
        self.record(Op::ClearCart)?;
        let mut state = self.state.lock().unwrap();
        if state.cart.id != cart {
            return Err(not_found());
        }
        state.cart.items.clear();
        Ok(())
    }

    async fn create_order(&self, request: &CreateOrderRequest) -> Result<Order, RemoteError> {
        self.record(Op::CreateOrder)?;
        self.wait(Op::CreateOrder).await;
        let mut state = self.state.lock().unwrap();
        if state.cart.items.is_empty() {
            return Err(RemoteError::Status {
                status: 400,
                body: ErrorBody::parse(r#"{"error": "Cart is empty"}"#),
            });
        }
        state.next_order += 1;
        let id = OrderId::new(state.next_order);
        let items = state
            .cart
            .items
            .iter()
            .enumerate()
            .map(|(n, line)| OrderLineItem {
                id: OrderLineId::new(id.get() * 100 + i64::try_from(n).unwrap()),
                product_id: line.product_id,
                product_name: line.display_name(),
                product_image: None,
                quantity: line.quantity,
                price: line.price,
            })
            .collect();
        let mut order = fixtures::order(id.get(), OrderStatus::Pending);
        order.user_id = request.user_id;
        order.shipping_address.clone_from(&request.shipping_address);
        order.shipping_method = Some(request.shipping_method);
        order.payment_method = Some(request.payment_method);
        order.items = items;
        order.total_amount = state.cart.subtotal() + Money::from_cents(1000);
        state.cart.items.clear();
        state.orders.push(order.clone());
        Ok(order)
    }

    async fn fetch_user_orders(&self, user: UserId) -> Result<Vec<Order>, RemoteError> {
        self.record(Op::FetchOrders)?;
        self.wait(Op::FetchOrders).await;
        let state = self.state.lock().unwrap();
        Ok(state
            .orders
            .iter()
            .rev()
            .filter(|o| o.user_id == user)
            .cloned()
            .collect())
    }

    async fn fetch_order(&self, order: OrderId) -> Result<Order, RemoteError> {
        self.record(Op::FetchOrder)?;
        let state = self.state.lock().unwrap();
        state
            .orders
            .iter()
            .find(|o| o.id == order)
            .cloned()
            .ok_or_else(not_found)
    }

    async fn cancel_order(&self, order: OrderId) -> Result<Order, RemoteError> {
        self.record(Op::CancelOrder)?;
        self.wait(Op::CancelOrder).await;
        let mut state = self.state.lock().unwrap();
        let order = state
            .orders
            .iter_mut()
            .find(|o| o.id == order)
            .ok_or_else(not_found)?;
        if order.status != OrderStatus::Pending {
            return Err(RemoteError::Status {
                status: 400,
                body: ErrorBody::parse(r#"{"error": "Only pending orders can be cancelled"}"#),
            });
        }
        order.status = OrderStatus::Cancelled;
        Ok(order.clone())
    }

    async fn fetch_products(&self, query: &ProductQuery) -> Result<Vec<Product>, RemoteError> {
        self.record(Op::FetchProducts)?;
        let state = self.state.lock().unwrap();
        Ok(state
            .products
            .iter()
            .filter(|p| {
                query
                    .search
                    .as_deref()
                    .is_none_or(|term| p.name.to_lowercase().contains(&term.to_lowercase()))
            })
            .cloned()
            .collect())
    }

    async fn fetch_product(&self, product: ProductId) -> Result<Product, RemoteError> {
        self.record(Op::FetchProduct)?;
        let state = self.state.lock().unwrap();
        state
            .products
            .iter()
            .find(|p| p.id == product)
            .cloned()
            .ok_or_else(not_found)
    }

    async fn fetch_products_by_category(
        &self,
        category: CategoryId,
    ) -> Result<Vec<Product>, RemoteError> {
        self.record(Op::FetchProductsByCategory)?;
        let state = self.state.lock().unwrap();
        Ok(state
            .products
            .iter()
            .filter(|p| p.category == Some(category))
            .cloned()
            .collect())
    }

    async fn fetch_categories(&self) -> Result<Vec<Category>, RemoteError> {
        self.record(Op::FetchCategories)?;
        Ok(self.state.lock().unwrap().categories.clone())
    }
}

pub mod fixtures {
    use super::*;

    pub const USER: UserId = UserId::new(9);
    pub const CART: CartId = CartId::new(3);

    pub fn product(id: i64, name: &str, cents: i64) -> Product {
        Product {
            id: ProductId::new(id),
            name: name.to_string(),
            description: String::new(),
            price: Money::from_cents(cents),
            stock: Some(25),
            image: None,
            category: Some(CategoryId::new(1)),
            rating: None,
            review_count: None,
        }
    }

    pub fn oats() -> Product {
        product(10, "Rolled Oats", 1000)
    }

    pub fn tea() -> Product {
        product(11, "Green Tea", 500)
    }

    pub fn line(id: i64, product: Product, quantity: i64) -> CartItem {
        CartItem {
            id: CartItemId::new(id),
            product_id: product.id,
            quantity: Quantity::new(quantity).unwrap(),
            price: product.price,
            product: Some(product),
        }
    }

    /// 10.00 x 2 + 5.00 x 1.
    pub fn cart() -> Cart {
        Cart {
            id: CART,
            user_id: USER,
            created_at: None,
            updated_at: None,
            items: vec![line(1, oats(), 2), line(2, tea(), 1)],
            total: Some(Money::from_cents(2500)),
        }
    }

    pub fn empty_cart() -> Cart {
        Cart {
            items: Vec::new(),
            total: None,
            ..cart()
        }
    }

    pub fn order(id: i64, status: OrderStatus) -> Order {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        Order {
            id: OrderId::new(id),
            order_id: None,
            user_id: USER,
            status,
            total_amount: Money::from_cents(3675),
            shipping_address: "1 Main St, Springfield, IL, 62701, US".to_string(),
            billing_address: None,
            shipping_method: None,
            payment_method: None,
            payment_status: false,
            created_at: at,
            updated_at: at,
            items: Vec::new(),
        }
    }
}
