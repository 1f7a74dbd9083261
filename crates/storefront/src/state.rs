//! Application context shared by every view.

use std::sync::Arc;

use larder_core::OrderId;

use crate::api::{Order, RemoteError, RestGateway, StoreGateway};
use crate::checkout::{Checkout, CheckoutError, Reconciliation, Totals};
use crate::config::StorefrontConfig;
use crate::session::{Gated, Identity, Session, require_identity};
use crate::stores::{CartState, CartStore, CatalogStore, OrderState, OrderStore};

/// Application state shared across all views.
///
/// This struct is cheaply cloneable via `Arc` and owns the session and the
/// projection stores. All stores share one gateway.
pub struct AppState<G = RestGateway> {
    inner: Arc<AppStateInner<G>>,
}

impl<G> Clone for AppState<G> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct AppStateInner<G> {
    config: StorefrontConfig,
    gateway: Arc<G>,
    session: Session,
    carts: CartStore<G>,
    orders: OrderStore<G>,
    catalog: CatalogStore<G>,
}

impl AppState<RestGateway> {
    /// Create application state talking to the configured service.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: StorefrontConfig) -> Result<Self, RemoteError> {
        let gateway = RestGateway::new(&config.api)?;
        Ok(Self::with_gateway(config, Arc::new(gateway)))
    }
}

impl<G: StoreGateway> AppState<G> {
    /// Create application state over an arbitrary gateway.
    #[must_use]
    pub fn with_gateway(config: StorefrontConfig, gateway: Arc<G>) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                carts: CartStore::new(Arc::clone(&gateway)),
                orders: OrderStore::new(Arc::clone(&gateway)),
                catalog: CatalogStore::new(Arc::clone(&gateway)),
                session: Session::new(),
                gateway,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn gateway(&self) -> &G {
        &self.inner.gateway
    }

    #[must_use]
    pub fn session(&self) -> &Session {
        &self.inner.session
    }

    #[must_use]
    pub fn carts(&self) -> &CartStore<G> {
        &self.inner.carts
    }

    #[must_use]
    pub fn orders(&self) -> &OrderStore<G> {
        &self.inner.orders
    }

    #[must_use]
    pub fn catalog(&self) -> &CatalogStore<G> {
        &self.inner.catalog
    }

    pub fn sign_in(&self, identity: Identity) {
        self.inner.session.sign_in(identity);
    }

    /// Forget the identity and everything cached on its behalf.
    pub fn sign_out(&self) {
        self.inner.session.sign_out();
        self.inner.carts.evict();
        self.inner.orders.evict();
    }

    /// Load the signed-in user's cart.
    pub async fn open_cart(&self) -> Gated<CartState> {
        let Some(user) = self.signed_in() else {
            return gate_closed();
        };
        Gated::Render(self.inner.carts.load_cart(user.id).await)
    }

    /// Load the signed-in user's order history.
    pub async fn open_orders(&self) -> Gated<OrderState> {
        let Some(user) = self.signed_in() else {
            return gate_closed();
        };
        Gated::Render(self.inner.orders.load_user_orders(user.id).await)
    }

    /// Load one order for the detail view.
    pub async fn open_order(&self, id: OrderId) -> Gated<OrderState> {
        if self.signed_in().is_none() {
            return gate_closed();
        }
        Gated::Render(self.inner.orders.load_order_by_id(id).await)
    }

    /// Start a checkout pre-filled from the signed-in profile, with the cart
    /// freshly loaded.
    pub async fn begin_checkout(&self) -> Gated<Checkout> {
        let Some(user) = self.signed_in() else {
            return gate_closed();
        };
        self.inner.carts.load_cart(user.id).await;
        Gated::Render(Checkout::for_identity(&user))
    }

    /// Submit `checkout` against the current cart snapshot. On success the
    /// cart is refetched, since the service builds the order from it.
    ///
    /// # Errors
    ///
    /// See [`Checkout::submit`].
    pub async fn place_order(&self, checkout: &mut Checkout) -> Result<Order, CheckoutError> {
        let cart = self.inner.carts.snapshot();
        let order = checkout.submit(&cart, &self.inner.orders).await?;
        self.inner.carts.load_cart(checkout.user()).await;
        Ok(order)
    }

    /// Advisory totals for the cached cart.
    #[must_use]
    pub fn cart_totals(&self) -> Option<Totals> {
        self.inner
            .carts
            .snapshot()
            .cart
            .as_ref()
            .and_then(|cart| Totals::for_cart(cart, &self.inner.config.pricing))
    }

    /// Compare an order's recorded total with the advisory computation over
    /// its line snapshots.
    #[must_use]
    pub fn reconcile_order(&self, order: &Order) -> Reconciliation {
        Totals::from_subtotal(order.items_subtotal(), &self.inner.config.pricing)
            .reconcile(order.total_amount)
    }

    fn signed_in(&self) -> Option<Identity> {
        let identity = self.inner.session.identity();
        require_identity(identity.as_ref(), Identity::clone).into_view()
    }
}

const fn gate_closed<V>() -> Gated<V> {
    Gated::Redirect(crate::routes::Route::Login)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use larder_core::{Email, Money, OrderLineId, OrderStatus, PaymentMethod, Quantity};

    use super::*;
    use crate::api::OrderLineItem;
    use crate::api::testing::fixtures::{self, USER};
    use crate::api::testing::{FakeGateway, Op};
    use crate::checkout::ShippingUpdate;
    use crate::routes::Route;

    fn app() -> (Arc<FakeGateway>, AppState<FakeGateway>) {
        let config = StorefrontConfig::from_lookup(|key| {
            (key == "LARDER_API_URL").then(|| "http://localhost:8000/api/".to_string())
        })
        .unwrap();
        let gateway = Arc::new(FakeGateway::new());
        (Arc::clone(&gateway), AppState::with_gateway(config, gateway))
    }

    fn identity() -> Identity {
        Identity {
            id: USER,
            first_name: Some("Ada".to_string()),
            last_name: Some("Lovelace".to_string()),
            email: Email::parse("ada@example.com").unwrap(),
            address: Some("1 Main St".to_string()),
            phone: Some("555-0100".to_string()),
        }
    }

    #[tokio::test]
    async fn test_protected_views_redirect_without_identity() {
        let (gateway, app) = app();

        assert!(app.open_cart().await.is_redirect());
        assert!(app.open_orders().await.is_redirect());
        assert!(app.open_order(OrderId::new(1)).await.is_redirect());
        assert!(matches!(
            app.begin_checkout().await,
            Gated::Redirect(Route::Login)
        ));

        assert_eq!(gateway.calls(Op::FetchCart), 0);
        assert_eq!(gateway.calls(Op::FetchOrders), 0);
    }

    #[tokio::test]
    async fn test_checkout_through_app_state() {
        let (gateway, app) = app();
        app.sign_in(identity());

        let mut checkout = app.begin_checkout().await.into_view().unwrap();
        assert_eq!(checkout.draft().unwrap().shipping.full_name, "Ada Lovelace");
        assert_eq!(app.cart_totals().unwrap().total, Money::from_cents(3675));

        checkout.update_shipping(ShippingUpdate {
            city: Some("Springfield".to_string()),
            zip_code: Some("62701".to_string()),
            country: Some("US".to_string()),
            ..ShippingUpdate::default()
        });
        checkout.set_payment_method(PaymentMethod::BankTransfer);
        checkout.next();
        checkout.next();

        let order = app.place_order(&mut checkout).await.unwrap();

        assert_eq!(order.status, OrderStatus::Pending);
        assert!(app.carts().snapshot().is_empty());
        assert_eq!(gateway.calls(Op::FetchCart), 2);
        // The fake charges shipping but no tax.
        assert!(matches!(
            app.reconcile_order(&order),
            Reconciliation::Differs { .. }
        ));
    }

    #[tokio::test]
    async fn test_sign_out_evicts_cart() {
        let (_gateway, app) = app();
        app.sign_in(identity());
        app.open_cart().await;
        assert!(!app.carts().snapshot().is_empty());

        app.sign_out();

        assert!(app.carts().snapshot().cart.is_none());
        assert!(app.open_cart().await.is_redirect());
    }

    #[tokio::test]
    async fn test_sign_out_evicts_orders() {
        let (gateway, app) = app();
        gateway.insert_order(fixtures::order(5, OrderStatus::Pending));
        app.sign_in(identity());
        app.open_orders().await;
        app.open_order(OrderId::new(5)).await;

        app.sign_out();

        let state = app.orders().snapshot();
        assert!(state.orders.is_empty());
        assert!(state.order.is_none());
        assert!(!state.success);
    }

    #[test]
    fn test_reconcile_matching_order() {
        let (_gateway, app) = app();
        let mut order = fixtures::order(1, OrderStatus::Delivered);
        order.items = vec![
            OrderLineItem {
                id: OrderLineId::new(1),
                product_id: fixtures::oats().id,
                product_name: "Rolled Oats".to_string(),
                product_image: None,
                quantity: Quantity::new(2).unwrap(),
                price: Money::from_cents(1000),
            },
            OrderLineItem {
                id: OrderLineId::new(2),
                product_id: fixtures::tea().id,
                product_name: "Green Tea".to_string(),
                product_image: None,
                quantity: Quantity::ONE,
                price: Money::from_cents(500),
            },
        ];

        assert_eq!(app.reconcile_order(&order), Reconciliation::Matches);
    }
}
