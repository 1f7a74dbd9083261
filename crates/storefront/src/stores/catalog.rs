//! Catalog projection: product listings, the product being viewed, and
//! categories. Read-only; caching happens in the gateway.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, instrument, warn};

use larder_core::{CategoryId, ProductId};

use super::{Lifecycle, LoadStatus, RequestSequencer, Ticket, Watermark};
use crate::api::{Category, Product, ProductQuery, RemoteError, StoreGateway};

const PRODUCTS_FAILED: &str = "Failed to fetch products";
const PRODUCT_FAILED: &str = "Failed to fetch product";
const CATEGORIES_FAILED: &str = "Failed to fetch categories";

/// Snapshot of the catalog slice.
#[derive(Debug, Clone, Default)]
pub struct CatalogState {
    pub products: Vec<Product>,
    pub product: Option<Product>,
    pub categories: Vec<Category>,
    pub lifecycle: Lifecycle,
    products_mark: Watermark,
    product_mark: Watermark,
    categories_mark: Watermark,
}

impl CatalogState {
    #[must_use]
    pub fn status(&self) -> LoadStatus {
        self.lifecycle.status
    }

    #[must_use]
    pub fn error_detail(&self) -> Option<&str> {
        self.lifecycle.error_detail.as_deref()
    }
}

pub struct CatalogStore<G> {
    gateway: Arc<G>,
    state: watch::Sender<CatalogState>,
    sequencer: RequestSequencer,
}

impl<G: StoreGateway> CatalogStore<G> {
    #[must_use]
    pub fn new(gateway: Arc<G>) -> Self {
        Self {
            gateway,
            state: watch::Sender::new(CatalogState::default()),
            sequencer: RequestSequencer::default(),
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> CatalogState {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CatalogState> {
        self.state.subscribe()
    }

    #[instrument(skip(self))]
    pub async fn load_products(&self, query: &ProductQuery) -> CatalogState {
        let ticket = self.begin();
        let result = self.gateway.fetch_products(query).await;
        self.settle(
            ticket,
            result,
            PRODUCTS_FAILED,
            |state| &mut state.products_mark,
            |state, products| state.products = products,
        );
        self.snapshot()
    }

    #[instrument(skip(self), fields(category_id = %category))]
    pub async fn load_products_by_category(&self, category: CategoryId) -> CatalogState {
        let ticket = self.begin();
        let result = self.gateway.fetch_products_by_category(category).await;
        self.settle(
            ticket,
            result,
            PRODUCTS_FAILED,
            |state| &mut state.products_mark,
            |state, products| state.products = products,
        );
        self.snapshot()
    }

    #[instrument(skip(self), fields(product_id = %product))]
    pub async fn load_product(&self, product: ProductId) -> CatalogState {
        let ticket = self.begin();
        let result = self.gateway.fetch_product(product).await;
        self.settle(
            ticket,
            result,
            PRODUCT_FAILED,
            |state| &mut state.product_mark,
            |state, product| state.product = Some(product),
        );
        self.snapshot()
    }

    #[instrument(skip(self))]
    pub async fn load_categories(&self) -> CatalogState {
        let ticket = self.begin();
        let result = self.gateway.fetch_categories().await;
        self.settle(
            ticket,
            result,
            CATEGORIES_FAILED,
            |state| &mut state.categories_mark,
            |state, categories| state.categories = categories,
        );
        self.snapshot()
    }

    /// Clear status and error detail. Cached listings are kept.
    pub fn reset(&self) {
        self.state.send_modify(|state| state.lifecycle.reset());
    }

    fn begin(&self) -> Ticket {
        let ticket = self.sequencer.next();
        self.state.send_modify(|state| state.lifecycle.begin());
        ticket
    }

    fn settle<T>(
        &self,
        ticket: Ticket,
        result: Result<T, RemoteError>,
        fallback: &'static str,
        mark: impl FnOnce(&mut CatalogState) -> &mut Watermark,
        apply: impl FnOnce(&mut CatalogState, T),
    ) {
        self.state.send_modify(|state| {
            if !mark(state).admit(ticket) {
                debug!(?ticket, "Discarding stale catalog response");
                state.lifecycle.complete();
                return;
            }
            match result {
                Ok(value) => {
                    apply(state, value);
                    state.lifecycle.succeed();
                }
                Err(err) => {
                    warn!(error = %err, "{fallback}");
                    state.lifecycle.fail(err.user_message(fallback));
                }
            }
        });
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::api::testing::{FakeGateway, Op, fixtures};

    fn store() -> (Arc<FakeGateway>, CatalogStore<FakeGateway>) {
        let gateway = Arc::new(FakeGateway::new());
        (Arc::clone(&gateway), CatalogStore::new(gateway))
    }

    #[tokio::test]
    async fn test_search_filters_products() {
        let (_gateway, store) = store();

        let state = store.load_products(&ProductQuery::search("oats")).await;
        assert_eq!(state.products.len(), 1);
        assert_eq!(state.products[0].name, "Rolled Oats");

        let state = store.load_products(&ProductQuery::default()).await;
        assert_eq!(state.products.len(), 2);
    }

    #[tokio::test]
    async fn test_load_product_and_categories() {
        let (gateway, store) = store();

        store.load_product(fixtures::tea().id).await;
        let state = store.load_categories().await;

        assert_eq!(state.product.as_ref().unwrap().name, "Green Tea");
        assert_eq!(state.categories.len(), 1);
        assert_eq!(state.status(), LoadStatus::Idle);
        assert_eq!(gateway.calls(Op::FetchCategories), 1);
    }

    #[tokio::test]
    async fn test_category_listing_replaces_products() {
        let (_gateway, store) = store();
        store.load_products(&ProductQuery::search("tea")).await;

        let state = store.load_products_by_category(CategoryId::new(1)).await;
        assert_eq!(state.products.len(), 2);

        let state = store.load_products_by_category(CategoryId::new(99)).await;
        assert!(state.products.is_empty());
    }

    #[tokio::test]
    async fn test_failure_then_reset() {
        let (gateway, store) = store();
        gateway.fail(Op::FetchProduct, 404, r#"{"detail": "Not found."}"#);

        let state = store.load_product(ProductId::new(1)).await;
        assert_eq!(state.error_detail(), Some("Not found."));

        store.reset();
        assert_eq!(store.snapshot().status(), LoadStatus::Idle);
    }
}
