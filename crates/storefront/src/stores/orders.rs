//! Order projection: order history, the order being viewed, and the
//! order-creation flags the checkout watches.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use larder_core::{OrderId, UserId};

use super::{Lifecycle, LoadStatus, RequestSequencer, Watermark};
use crate::api::{CreateOrderRequest, Order, StoreGateway};
use crate::error::{ValidationError, add_breadcrumb};

const CREATE_FAILED: &str = "Failed to create order";
const LIST_FAILED: &str = "Failed to fetch orders";
const DETAIL_FAILED: &str = "Failed to fetch order details";
const CANCEL_FAILED: &str = "Failed to cancel order";

/// Snapshot of the order slice.
#[derive(Debug, Clone, Default)]
pub struct OrderState {
    /// The user's orders as returned by the service.
    pub orders: Vec<Order>,
    /// The order most recently created, fetched or cancelled.
    pub order: Option<Order>,
    /// Set once `create_order` succeeds; cleared by `reset`.
    pub success: bool,
    pub lifecycle: Lifecycle,
    created_id: Option<OrderId>,
    list_mark: Watermark,
    detail_mark: Watermark,
}

/// Outcome of [`OrderStore::create_order`].
#[derive(Debug, Clone)]
pub struct Placement {
    /// Store snapshot once the response settled.
    pub state: OrderState,
    /// The record the service created. Present even when a newer detail
    /// read kept it out of the detail slot.
    pub order: Option<Order>,
}

impl OrderState {
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

    /// The created order, if creation has succeeded since the last reset
    /// and the record is still cached.
    #[must_use]
    pub fn created(&self) -> Option<&Order> {
        self.created_id
            .filter(|_| self.success)
            .and_then(|id| self.find(id))
    }

    /// Look up `id` in the detail slot, then in the list.
    #[must_use]
    pub fn find(&self, id: OrderId) -> Option<&Order> {
        self.order
            .as_ref()
            .filter(|order| order.id == id)
            .or_else(|| self.orders.iter().find(|order| order.id == id))
    }
}

/// Store for order reads, creation and cancellation.
pub struct OrderStore<G> {
    gateway: Arc<G>,
    state: watch::Sender<OrderState>,
    sequencer: RequestSequencer,
}

impl<G: StoreGateway> OrderStore<G> {
    #[must_use]
    pub fn new(gateway: Arc<G>) -> Self {
        Self {
            gateway,
            state: watch::Sender::new(OrderState::default()),
            sequencer: RequestSequencer::default(),
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> OrderState {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<OrderState> {
        self.state.subscribe()
    }

    /// Place an order from the user's server-side cart.
    ///
    /// On success `success` is set and `order` holds the created record,
    /// unless a newer detail read has settled in the meantime. On failure
    /// `success` stays false and `error_detail` explains why.
    #[instrument(skip(self, request), fields(user_id = %request.user_id))]
    pub async fn create_order(&self, request: &CreateOrderRequest) -> Placement {
        let ticket = self.sequencer.next();
        add_breadcrumb(
            "checkout",
            "Create order",
            Some(&[("payment_method", request.payment_method.as_str())]),
        );
        self.state.send_modify(|state| {
            state.success = false;
            state.created_id = None;
            state.lifecycle.begin();
        });

        let result = self.gateway.create_order(request).await;

        let mut created = None;
        self.state.send_modify(|state| match result {
            Ok(order) => {
                info!(order_id = %order.id, total = %order.total_amount, "Order created");
                state.success = true;
                state.created_id = Some(order.id);
                if state.detail_mark.admit(ticket) {
                    state.order = Some(order.clone());
                } else {
                    debug!(?ticket, "Newer order detail already shown");
                }
                state.lifecycle.succeed();
                created = Some(order);
            }
            Err(err) => {
                warn!(error = %err, "{CREATE_FAILED}");
                state.lifecycle.fail(err.user_message(CREATE_FAILED));
            }
        });
        Placement {
            state: self.snapshot(),
            order: created,
        }
    }

    /// Replace the order list with the service's, in the order returned.
    #[instrument(skip(self), fields(user_id = %user))]
    pub async fn load_user_orders(&self, user: UserId) -> OrderState {
        let ticket = self.sequencer.next();
        self.state.send_modify(|state| state.lifecycle.begin());

        let result = self.gateway.fetch_user_orders(user).await;

        self.state.send_modify(|state| {
            if !state.list_mark.admit(ticket) {
                debug!(?ticket, "Discarding stale order list");
                state.lifecycle.complete();
                return;
            }
            match result {
                Ok(orders) => {
                    state.orders = orders;
                    state.lifecycle.succeed();
                }
                Err(err) => {
                    warn!(error = %err, "{LIST_FAILED}");
                    state.lifecycle.fail(err.user_message(LIST_FAILED));
                }
            }
        });
        self.snapshot()
    }

    /// Replace the detail slot with order `id`.
    #[instrument(skip(self), fields(order_id = %id))]
    pub async fn load_order_by_id(&self, id: OrderId) -> OrderState {
        let ticket = self.sequencer.next();
        self.state.send_modify(|state| state.lifecycle.begin());

        let result = self.gateway.fetch_order(id).await;

        self.state.send_modify(|state| {
            if !state.detail_mark.admit(ticket) {
                debug!(?ticket, "Discarding stale order detail");
                state.lifecycle.complete();
                return;
            }
            match result {
                Ok(order) => {
                    state.order = Some(order);
                    state.lifecycle.succeed();
                }
                Err(err) => {
                    warn!(error = %err, "{DETAIL_FAILED}");
                    state.lifecycle.fail(err.user_message(DETAIL_FAILED));
                }
            }
        });
        self.snapshot()
    }

    /// Cancel a pending order.
    ///
    /// When the order is cached locally its status is checked first; an order
    /// that is not cached is sent to the service, which has the final word.
    /// On success the detail slot and the matching list entry are replaced
    /// with the service's record.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::NotCancellable` without dispatching when the
    /// cached order is past `pending`.
    #[instrument(skip(self), fields(order_id = %id))]
    pub async fn cancel_order(&self, id: OrderId) -> Result<OrderState, ValidationError> {
        let known = self.state.borrow().find(id).map(|order| order.status);
        if let Some(status) = known
            && !status.is_cancellable()
        {
            return Err(ValidationError::NotCancellable { order: id, status });
        }

        add_breadcrumb("orders", "Cancel order", Some(&[("order_id", &id.to_string())]));
        let ticket = self.sequencer.next();
        self.state.send_modify(|state| state.lifecycle.begin());

        let result = self.gateway.cancel_order(id).await;

        self.state.send_modify(|state| match result {
            Ok(order) => {
                info!(status = %order.status, "Order cancelled");
                if let Some(entry) = state.orders.iter_mut().find(|o| o.id == order.id) {
                    entry.clone_from(&order);
                }
                if state.detail_mark.admit(ticket) {
                    state.order = Some(order);
                } else {
                    debug!(?ticket, "Newer order detail already shown");
                }
                state.lifecycle.succeed();
            }
            Err(err) => {
                warn!(error = %err, "{CANCEL_FAILED}");
                state.lifecycle.fail(err.user_message(CANCEL_FAILED));
            }
        });
        Ok(self.snapshot())
    }

    /// Clear `status`, `error_detail` and `success`. Cached orders are kept.
    pub fn reset(&self) {
        self.state.send_modify(|state| {
            state.success = false;
            state.lifecycle.reset();
        });
    }

    /// Drop every cached order. Responses to requests dispatched before the
    /// eviction are discarded.
    pub fn evict(&self) {
        let ticket = self.sequencer.next();
        self.state.send_modify(|state| {
            state.list_mark.admit(ticket);
            state.detail_mark.admit(ticket);
            state.orders.clear();
            state.order = None;
            state.success = false;
            state.created_id = None;
            state.lifecycle.reset();
        });
    }
}
