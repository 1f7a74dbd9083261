//! Projection stores.
//!
//! Each store owns one slice of client state, mediates every mutation through
//! the [`StoreGateway`](crate::api::StoreGateway), and publishes snapshots on
//! a `tokio::sync::watch` channel. Remote failures are absorbed into the
//! slice's [`Lifecycle`]; nothing but local validation errors escapes a store
//! method.
//!
//! # Ordering
//!
//! The backing service does not order independently dispatched requests, so
//! responses can arrive out of order. Every request draws a [`Ticket`] from
//! the store's [`RequestSequencer`] before its first await. A response may
//! only settle a data slot when its ticket is newer than the slot's
//! [`Watermark`]; older responses are dropped.

mod cart;
mod catalog;
mod orders;

use std::sync::atomic::{AtomicU64, Ordering};

pub use cart::{CartState, CartStore};
pub use catalog::{CatalogState, CatalogStore};
pub use orders::{OrderState, OrderStore, Placement};

/// Coarse request status of a store slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadStatus {
    #[default]
    Idle,
    Loading,
    Error,
}

/// Request lifecycle flags shared by every store.
///
/// `status` stays `Loading` while any request is in flight. A failure flips it
/// to `Error` immediately and keeps it there until the next request starts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Lifecycle {
    pub status: LoadStatus,
    pub error_detail: Option<String>,
    in_flight: u32,
}

impl Lifecycle {
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.status == LoadStatus::Loading
    }

    #[must_use]
    pub const fn in_flight(&self) -> u32 {
        self.in_flight
    }

    /// A request was dispatched.
    pub(crate) fn begin(&mut self) {
        self.in_flight += 1;
        self.status = LoadStatus::Loading;
        self.error_detail = None;
    }

    /// A request delivered fresh data.
    pub(crate) fn succeed(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
        self.error_detail = None;
        self.status = if self.in_flight > 0 {
            LoadStatus::Loading
        } else {
            LoadStatus::Idle
        };
    }

    /// A request finished without touching data (acknowledged mutation or
    /// stale response). Does not clear an error set by another request.
    pub(crate) fn complete(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
        if self.status == LoadStatus::Loading && self.in_flight == 0 {
            self.status = LoadStatus::Idle;
        }
    }

    /// A request failed.
    pub(crate) fn fail(&mut self, detail: String) {
        self.in_flight = self.in_flight.saturating_sub(1);
        self.status = LoadStatus::Error;
        self.error_detail = Some(detail);
    }

    /// Clear status and error, keeping the in-flight count.
    pub(crate) fn reset(&mut self) {
        self.error_detail = None;
        self.status = if self.in_flight > 0 {
            LoadStatus::Loading
        } else {
            LoadStatus::Idle
        };
    }
}

/// Dispatch order of a request within one store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ticket(u64);

/// Monotonic ticket source.
#[derive(Debug, Default)]
pub struct RequestSequencer(AtomicU64);

impl RequestSequencer {
    pub fn next(&self) -> Ticket {
        Ticket(self.0.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

/// Newest ticket that settled a data slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Watermark(Option<Ticket>);

impl Watermark {
    /// Accept `ticket` if it is newer than everything already applied, and
    /// advance past it.
    pub fn admit(&mut self, ticket: Ticket) -> bool {
        if self.0.is_some_and(|applied| applied >= ticket) {
            return false;
        }
        self.0 = Some(ticket);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watermark_rejects_older_tickets() {
        let sequencer = RequestSequencer::default();
        let first = sequencer.next();
        let second = sequencer.next();

        let mut mark = Watermark::default();
        assert!(mark.admit(second));
        assert!(!mark.admit(first));
        assert!(!mark.admit(second));
        assert!(mark.admit(sequencer.next()));
    }

    #[test]
    fn test_lifecycle_stays_loading_until_last_request() {
        let mut life = Lifecycle::default();
        life.begin();
        life.begin();
        life.succeed();
        assert!(life.is_loading());
        life.complete();
        assert_eq!(life.status, LoadStatus::Idle);
        assert_eq!(life.in_flight(), 0);
    }

    #[test]
    fn test_lifecycle_failure_survives_completion() {
        let mut life = Lifecycle::default();
        life.begin();
        life.begin();
        life.fail("Failed to fetch cart".to_string());
        life.complete();
        assert_eq!(life.status, LoadStatus::Error);
        assert_eq!(life.error_detail.as_deref(), Some("Failed to fetch cart"));
    }

    #[test]
    fn test_lifecycle_reset_is_idempotent() {
        let mut life = Lifecycle::default();
        life.begin();
        life.fail("boom".to_string());
        life.reset();
        let once = life.clone();
        life.reset();
        assert_eq!(life, once);
        assert_eq!(life.status, LoadStatus::Idle);
        assert!(life.error_detail.is_none());
    }
}
