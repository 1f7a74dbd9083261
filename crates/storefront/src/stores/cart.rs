//! Cart projection.
//!
//! The cached cart is only ever replaced by a full read from the service.
//! Mutation responses are acknowledged and thrown away; each successful add,
//! update or remove is followed by exactly one refetch for the cart's owner.
//! Clearing is the exception: the service answers with no body, so the
//! cached lines are emptied in place.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, instrument, warn};

use larder_core::{CartId, CartItemId, Money, ProductId, Quantity, UserId};

use super::{Lifecycle, LoadStatus, RequestSequencer, Ticket, Watermark};
use crate::api::{Cart, CartItem, NewCartItem, RemoteError, StoreGateway};
use crate::error::{ValidationError, add_breadcrumb};

const FETCH_FAILED: &str = "Failed to fetch cart";
const ADD_FAILED: &str = "Failed to add item to cart";
const UPDATE_FAILED: &str = "Failed to update cart item";
const REMOVE_FAILED: &str = "Failed to remove item from cart";
const CLEAR_FAILED: &str = "Failed to clear cart";

/// Snapshot of the cart slice.
#[derive(Debug, Clone, Default)]
pub struct CartState {
    /// Last successfully fetched cart, if any.
    pub cart: Option<Cart>,
    pub lifecycle: Lifecycle,
    owner: Option<UserId>,
    watermark: Watermark,
}

impl CartState {
    #[must_use]
    pub fn status(&self) -> LoadStatus {
        self.lifecycle.status
    }

    #[must_use]
    pub fn error_detail(&self) -> Option<&str> {
        self.lifecycle.error_detail.as_deref()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.lifecycle.is_loading()
    }

    /// Cached lines, empty when no cart has been loaded.
    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        self.cart.as_ref().map_or(&[], |cart| cart.items.as_slice())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items().is_empty()
    }

    /// User whose cart this projection follows.
    #[must_use]
    pub const fn owner(&self) -> Option<UserId> {
        self.owner
    }
}

/// Store mediating every cart mutation.
pub struct CartStore<G> {
    gateway: Arc<G>,
    state: watch::Sender<CartState>,
    sequencer: RequestSequencer,
}

impl<G: StoreGateway> CartStore<G> {
    #[must_use]
    pub fn new(gateway: Arc<G>) -> Self {
        Self {
            gateway,
            state: watch::Sender::new(CartState::default()),
            sequencer: RequestSequencer::default(),
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> CartState {
        self.state.borrow().clone()
    }

    /// Receive every published snapshot.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CartState> {
        self.state.subscribe()
    }

    /// Fetch `user`'s cart and replace the cached one.
    #[instrument(skip(self), fields(user_id = %user))]
    pub async fn load_cart(&self, user: UserId) -> CartState {
        let ticket = self.sequencer.next();
        self.state.send_modify(|state| {
            state.owner = Some(user);
            state.lifecycle.begin();
        });

        let result = self.gateway.fetch_user_cart(user).await;

        self.state.send_modify(|state| settle_fetch(state, ticket, result));
        self.snapshot()
    }

    /// Add `quantity` units of `product` to `cart`, then refetch.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::Quantity` without dispatching when
    /// `quantity` is below one.
    #[instrument(skip(self), fields(cart_id = %cart, product_id = %product))]
    pub async fn add_item(
        &self,
        cart: CartId,
        product: ProductId,
        quantity: i64,
    ) -> Result<CartState, ValidationError> {
        let quantity = Quantity::new(quantity)?;
        add_breadcrumb(
            "cart",
            "Add item",
            Some(&[("product_id", &product.to_string())]),
        );

        let item = NewCartItem {
            cart,
            product_id: product,
            quantity,
        };
        self.mutate(ADD_FAILED, self.gateway.add_cart_item(&item))
            .await;
        Ok(self.snapshot())
    }

    /// Set an item's absolute quantity, then refetch.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::Quantity` without dispatching when
    /// `quantity` is zero or negative.
    #[instrument(skip(self), fields(item_id = %item))]
    pub async fn update_item_quantity(
        &self,
        item: CartItemId,
        quantity: i64,
    ) -> Result<CartState, ValidationError> {
        let quantity = Quantity::new(quantity)?;
        self.mutate(
            UPDATE_FAILED,
            self.gateway.update_cart_item(item, quantity),
        )
        .await;
        Ok(self.snapshot())
    }

    /// Move an item's quantity by `delta` from its cached value.
    ///
    /// Stepping below one is rejected; removal is a separate operation.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::UnknownCartItem` if the line is not cached
    /// and `ValidationError::Quantity` if the result would drop below one.
    pub async fn step_item_quantity(
        &self,
        item: CartItemId,
        delta: i64,
    ) -> Result<CartState, ValidationError> {
        let current = self
            .state
            .borrow()
            .cart
            .as_ref()
            .and_then(|cart| cart.item(item))
            .map(|line| line.quantity)
            .ok_or(ValidationError::UnknownCartItem(item))?;

        let target = current.step(delta)?;
        self.update_item_quantity(item, i64::from(target.get()))
            .await
    }

    /// Delete a line, then refetch.
    #[instrument(skip(self), fields(item_id = %item))]
    pub async fn remove_item(&self, item: CartItemId) -> CartState {
        add_breadcrumb("cart", "Remove item", Some(&[("item_id", &item.to_string())]));
        self.mutate(REMOVE_FAILED, self.gateway.remove_cart_item(item))
            .await;
        self.snapshot()
    }

    /// Delete every line. On success the cached lines are emptied without a
    /// refetch.
    #[instrument(skip(self), fields(cart_id = %cart))]
    pub async fn clear_cart(&self, cart: CartId) -> CartState {
        let ticket = self.sequencer.next();
        self.state.send_modify(|state| state.lifecycle.begin());

        let result = self.gateway.clear_cart(cart).await;

        self.state.send_modify(|state| match result {
            Ok(()) => {
                if state.watermark.admit(ticket) {
                    if let Some(cached) = state.cart.as_mut().filter(|c| c.id == cart) {
                        cached.items.clear();
                        cached.total = cached.total.map(|_| Money::ZERO);
                    }
                    state.lifecycle.succeed();
                } else {
                    state.lifecycle.complete();
                }
            }
            Err(err) => {
                warn!(error = %err, "{CLEAR_FAILED}");
                state.lifecycle.fail(err.user_message(CLEAR_FAILED));
            }
        });
        self.snapshot()
    }

    /// Clear status and error detail. Cached data is kept.
    pub fn reset(&self) {
        self.state.send_modify(|state| state.lifecycle.reset());
    }

    /// Drop the cached cart and its owner, e.g. on sign-out.
    ///
    /// Responses to requests dispatched before the eviction are discarded.
    pub fn evict(&self) {
        let ticket = self.sequencer.next();
        self.state.send_modify(|state| {
            state.watermark.admit(ticket);
            state.cart = None;
            state.owner = None;
            state.lifecycle.reset();
        });
    }

    /// Run a mutation and, when it succeeds, refetch the owner's cart before
    /// settling the mutation's own in-flight slot.
    async fn mutate<T>(
        &self,
        fallback: &'static str,
        request: impl Future<Output = Result<T, RemoteError>>,
    ) {
        self.state.send_modify(|state| state.lifecycle.begin());

        match request.await {
            Ok(_) => {
                self.refetch().await;
                self.state.send_modify(|state| state.lifecycle.complete());
            }
            Err(err) => {
                warn!(error = %err, "{fallback}");
                self.state
                    .send_modify(|state| state.lifecycle.fail(err.user_message(fallback)));
            }
        }
    }

    async fn refetch(&self) {
        let owner = {
            let state = self.state.borrow();
            state
                .owner
                .or_else(|| state.cart.as_ref().map(|cart| cart.user_id))
        };

        match owner {
            Some(user) => {
                self.load_cart(user).await;
            }
            None => warn!("Cart owner unknown, skipping refetch"),
        }
    }
}

fn settle_fetch(state: &mut CartState, ticket: Ticket, result: Result<Cart, RemoteError>) {
    if !state.watermark.admit(ticket) {
        debug!(?ticket, "Discarding stale cart response");
        state.lifecycle.complete();
        return;
    }

    match result {
        Ok(cart) => {
            state.cart = Some(cart);
            state.lifecycle.succeed();
        }
        Err(err) => {
            warn!(error = %err, "{FETCH_FAILED}");
            state.lifecycle.fail(err.user_message(FETCH_FAILED));
        }
    }
}
