//! Checkout orchestrator.
//!
//! A three-step wizard (shipping, payment, review) over a [`CheckoutDraft`].
//! Moving between steps is unconditional; the whole draft is validated once,
//! on submission from the review step. Submission turns the draft into a
//! single [`CreateOrderRequest`](crate::api::CreateOrderRequest) and hands it
//! to the [`OrderStore`]; the record it returns decides the outcome.
//!
//! # States
//!
//! ```text
//! Shipping <-> Payment <-> Review --submit--> Submitting --> Completed
//!                            ^                    |
//!                            +------ rejected ----+
//! ```

mod draft;
mod totals;

use thiserror::Error;
use tracing::{info, instrument, warn};

use larder_core::{OrderId, PaymentMethod, ShippingMethod, UserId};

pub use draft::{CheckoutDraft, PaymentDetails, PaymentUpdate, ShippingDetails, ShippingUpdate};
pub use totals::{Reconciliation, Totals};

use crate::api::{Order, StoreGateway};
use crate::config::PricingConfig;
use crate::error::ValidationError;
use crate::routes::Route;
use crate::session::Identity;
use crate::stores::{CartState, OrderStore, Placement};

const CREATE_FAILED: &str = "Failed to create order";

/// Wizard step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CheckoutStep {
    #[default]
    Shipping,
    Payment,
    Review,
}

impl CheckoutStep {
    pub const ALL: [Self; 3] = [Self::Shipping, Self::Payment, Self::Review];

    /// Zero-based position.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Shipping => 0,
            Self::Payment => 1,
            Self::Review => 2,
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Shipping => "Shipping address",
            Self::Payment => "Payment details",
            Self::Review => "Review your order",
        }
    }

    const fn next(self) -> Option<Self> {
        match self {
            Self::Shipping => Some(Self::Payment),
            Self::Payment => Some(Self::Review),
            Self::Review => None,
        }
    }

    const fn previous(self) -> Option<Self> {
        match self {
            Self::Shipping => None,
            Self::Payment => Some(Self::Shipping),
            Self::Review => Some(Self::Payment),
        }
    }
}

/// Where the checkout is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CheckoutPhase {
    #[default]
    Editing,
    Submitting,
    Completed(OrderId),
}

/// Errors returned by [`Checkout::submit`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckoutError {
    #[error("Orders can only be placed from the review step")]
    NotOnReviewStep,

    #[error("This checkout has already been submitted")]
    AlreadySubmitted,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The service did not create the order.
    #[error("{0}")]
    OrderRejected(String),
}

/// One checkout session for one user.
#[derive(Debug, Clone)]
pub struct Checkout {
    user: UserId,
    step: CheckoutStep,
    phase: CheckoutPhase,
    draft: Option<CheckoutDraft>,
    error_detail: Option<String>,
}

impl Checkout {
    /// Start a checkout with an empty draft.
    #[must_use]
    pub fn new(user: UserId) -> Self {
        Self::with_draft(user, CheckoutDraft::default())
    }

    /// Start a checkout pre-filled from the signed-in profile.
    #[must_use]
    pub fn for_identity(identity: &Identity) -> Self {
        Self::with_draft(identity.id, CheckoutDraft::for_identity(identity))
    }

    #[must_use]
    pub const fn with_draft(user: UserId, draft: CheckoutDraft) -> Self {
        Self {
            user,
            step: CheckoutStep::Shipping,
            phase: CheckoutPhase::Editing,
            draft: Some(draft),
            error_detail: None,
        }
    }

    #[must_use]
    pub const fn user(&self) -> UserId {
        self.user
    }

    #[must_use]
    pub const fn step(&self) -> CheckoutStep {
        self.step
    }

    #[must_use]
    pub const fn phase(&self) -> CheckoutPhase {
        self.phase
    }

    /// The draft, or `None` once the order has been created.
    #[must_use]
    pub const fn draft(&self) -> Option<&CheckoutDraft> {
        self.draft.as_ref()
    }

    /// Why the last submission failed.
    #[must_use]
    pub fn error_detail(&self) -> Option<&str> {
        self.error_detail.as_deref()
    }

    #[must_use]
    pub const fn is_completed(&self) -> bool {
        matches!(self.phase, CheckoutPhase::Completed(_))
    }

    /// Where to navigate once the order exists.
    #[must_use]
    pub const fn completion_route(&self) -> Option<Route> {
        match self.phase {
            CheckoutPhase::Completed(id) => Some(Route::OrderDetail(id)),
            CheckoutPhase::Editing | CheckoutPhase::Submitting => None,
        }
    }

    /// Advance one step. No-op on the review step.
    pub fn next(&mut self) {
        if let Some(step) = self.step.next() {
            self.step = step;
        }
    }

    /// Go back one step. No-op on the first step.
    pub fn back(&mut self) {
        if let Some(step) = self.step.previous() {
            self.step = step;
        }
    }

    pub fn update_shipping(&mut self, update: ShippingUpdate) {
        if let Some(draft) = self.draft.as_mut() {
            draft.merge_shipping(update);
        }
    }

    pub fn set_shipping_method(&mut self, method: ShippingMethod) {
        if let Some(draft) = self.draft.as_mut() {
            draft.shipping_method = method;
        }
    }

    pub fn set_payment_method(&mut self, method: PaymentMethod) {
        if let Some(draft) = self.draft.as_mut() {
            draft.payment_method = method;
        }
    }

    pub fn update_payment_details(&mut self, update: PaymentUpdate) {
        if let Some(draft) = self.draft.as_mut() {
            draft.merge_payment(update);
        }
    }

    /// Advisory totals for the cart being checked out.
    #[must_use]
    pub fn totals(&self, cart: &CartState, pricing: &PricingConfig) -> Option<Totals> {
        cart.cart
            .as_ref()
            .and_then(|cart| Totals::for_cart(cart, pricing))
    }

    /// Validate the draft and place the order.
    ///
    /// On success the checkout is completed, the draft is discarded and the
    /// created order is returned. On any failure the step and the draft are
    /// left exactly as they were and `error_detail` explains why.
    ///
    /// # Errors
    ///
    /// - `AlreadySubmitted` if an order was already created
    /// - `NotOnReviewStep` unless on the review step
    /// - `Validation` for an empty cart or an incomplete draft; nothing is
    ///   dispatched
    /// - `OrderRejected` when the service refuses the order
    #[instrument(skip_all, fields(user_id = %self.user, step = ?self.step))]
    pub async fn submit<G: StoreGateway>(
        &mut self,
        cart: &CartState,
        orders: &OrderStore<G>,
    ) -> Result<Order, CheckoutError> {
        if self.is_completed() {
            return Err(CheckoutError::AlreadySubmitted);
        }
        if self.step != CheckoutStep::Review {
            return Err(CheckoutError::NotOnReviewStep);
        }
        let Some(draft) = self.draft.as_ref() else {
            return Err(CheckoutError::AlreadySubmitted);
        };

        let validated = if cart.is_empty() {
            Err(ValidationError::EmptyCart)
        } else {
            draft.validate()
        };
        if let Err(err) = validated {
            self.error_detail = Some(err.to_string());
            return Err(err.into());
        }

        let request = draft.order_request(self.user);
        self.error_detail = None;
        self.phase = CheckoutPhase::Submitting;

        orders.reset();
        let Placement { state, order } = orders.create_order(&request).await;

        match order {
            Some(order) => {
                info!(order_id = %order.id, "Checkout completed");
                self.phase = CheckoutPhase::Completed(order.id);
                self.draft = None;
                Ok(order)
            }
            None => {
                let detail = state.error_detail().unwrap_or(CREATE_FAILED).to_string();
                warn!(error = %detail, "Checkout rejected");
                self.phase = CheckoutPhase::Editing;
                self.error_detail = Some(detail.clone());
                Err(CheckoutError::OrderRejected(detail))
            }
        }
    }

    /// Abandon the checkout. Clears the order store's creation flags so the
    /// next checkout starts clean.
    pub fn leave<G: StoreGateway>(self, orders: &OrderStore<G>) {
        orders.reset();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use larder_core::{Email, OrderStatus};

    use super::*;
    use crate::api::testing::fixtures::USER;
    use crate::api::testing::{FakeGateway, Op, fixtures};
    use crate::stores::CartStore;

    struct Harness {
        gateway: Arc<FakeGateway>,
        carts: CartStore<FakeGateway>,
        orders: OrderStore<FakeGateway>,
    }

    impl Harness {
        fn new(gateway: FakeGateway) -> Self {
            let gateway = Arc::new(gateway);
            Self {
                carts: CartStore::new(Arc::clone(&gateway)),
                orders: OrderStore::new(Arc::clone(&gateway)),
                gateway,
            }
        }
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

    fn ready_checkout() -> Checkout {
        let mut checkout = Checkout::for_identity(&identity());
        checkout.update_shipping(ShippingUpdate {
            city: Some("Springfield".to_string()),
            state: Some("IL".to_string()),
            zip_code: Some("62701".to_string()),
            country: Some("US".to_string()),
            ..ShippingUpdate::default()
        });
        checkout.set_payment_method(PaymentMethod::Paypal);
        checkout.next();
        checkout.next();
        checkout
    }

    #[test]
    fn test_step_navigation_is_clamped() {
        let mut checkout = Checkout::new(USER);
        checkout.back();
        assert_eq!(checkout.step(), CheckoutStep::Shipping);

        checkout.next();
        checkout.next();
        checkout.next();
        assert_eq!(checkout.step(), CheckoutStep::Review);

        checkout.back();
        assert_eq!(checkout.step(), CheckoutStep::Payment);
        assert_eq!(checkout.step().index(), 1);
    }

    #[tokio::test]
    async fn test_submit_only_from_review() {
        let h = Harness::new(FakeGateway::new());
        let cart = h.carts.load_cart(USER).await;
        let mut checkout = ready_checkout();
        checkout.back();

        let err = checkout.submit(&cart, &h.orders).await.unwrap_err();

        assert_eq!(err, CheckoutError::NotOnReviewStep);
        assert_eq!(h.gateway.calls(Op::CreateOrder), 0);
    }

    #[tokio::test]
    async fn test_successful_submit_completes_and_discards_draft() {
        let h = Harness::new(FakeGateway::new());
        let cart = h.carts.load_cart(USER).await;
        let mut checkout = ready_checkout();

        let order = checkout.submit(&cart, &h.orders).await.unwrap();

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.shipping_address, "1 Main St, Springfield, IL, 62701, US");
        assert_eq!(order.payment_method, Some(PaymentMethod::Paypal));
        assert_eq!(checkout.phase(), CheckoutPhase::Completed(order.id));
        assert_eq!(checkout.completion_route(), Some(Route::OrderDetail(order.id)));
        assert!(checkout.draft().is_none());

        let err = checkout.submit(&cart, &h.orders).await.unwrap_err();
        assert_eq!(err, CheckoutError::AlreadySubmitted);
        assert_eq!(h.gateway.calls(Op::CreateOrder), 1);
    }

    #[tokio::test]
    async fn test_rejected_order_keeps_step_and_draft() {
        let h = Harness::new(FakeGateway::new());
        h.gateway
            .fail(Op::CreateOrder, 400, r#"{"error": "Payment method not accepted"}"#);
        let cart = h.carts.load_cart(USER).await;
        let mut checkout = ready_checkout();
        let before = checkout.draft().cloned();

        let err = checkout.submit(&cart, &h.orders).await.unwrap_err();

        assert_eq!(
            err,
            CheckoutError::OrderRejected("Payment method not accepted".to_string())
        );
        assert_eq!(checkout.step(), CheckoutStep::Review);
        assert_eq!(checkout.phase(), CheckoutPhase::Editing);
        assert_eq!(checkout.draft().cloned(), before);
        assert_eq!(checkout.error_detail(), Some("Payment method not accepted"));

        // Retry succeeds once the service accepts it.
        h.gateway.recover(Op::CreateOrder);
        assert!(checkout.submit(&cart, &h.orders).await.is_ok());
    }

    #[tokio::test]
    async fn test_incomplete_draft_is_not_dispatched() {
        let h = Harness::new(FakeGateway::new());
        let cart = h.carts.load_cart(USER).await;
        let mut checkout = Checkout::for_identity(&identity());
        checkout.next();
        checkout.next();

        let err = checkout.submit(&cart, &h.orders).await.unwrap_err();

        assert!(matches!(
            err,
            CheckoutError::Validation(ValidationError::MissingFields(_))
        ));
        assert!(checkout.error_detail().unwrap().starts_with("Please fill in"));
        assert_eq!(h.gateway.calls(Op::CreateOrder), 0);
    }

    #[tokio::test]
    async fn test_empty_cart_is_rejected() {
        let h = Harness::new(FakeGateway::with_cart(fixtures::empty_cart()));
        let cart = h.carts.load_cart(USER).await;
        let mut checkout = ready_checkout();

        let err = checkout.submit(&cart, &h.orders).await.unwrap_err();

        assert_eq!(err, CheckoutError::Validation(ValidationError::EmptyCart));
        assert_eq!(h.gateway.calls(Op::CreateOrder), 0);
    }

    #[tokio::test]
    async fn test_totals_follow_cart() {
        let h = Harness::new(FakeGateway::new());
        let cart = h.carts.load_cart(USER).await;
        let checkout = ready_checkout();

        let totals = checkout.totals(&cart, &PricingConfig::default()).unwrap();
        assert_eq!(totals.total.to_string(), "36.75");
    }

    #[tokio::test]
    async fn test_leave_resets_order_flags() {
        let h = Harness::new(FakeGateway::new());
        h.gateway.fail(Op::CreateOrder, 500, "");
        let cart = h.carts.load_cart(USER).await;
        let mut checkout = ready_checkout();
        let _ = checkout.submit(&cart, &h.orders).await;
        assert!(h.orders.snapshot().error_detail().is_some());

        checkout.leave(&h.orders);

        assert!(h.orders.snapshot().error_detail().is_none());
    }
}
