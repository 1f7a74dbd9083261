//! Advisory order totals.
//!
//! Derived from the cart projection on demand and never stored. The service
//! computes the authoritative `total_amount`; these figures only preview it.

use larder_core::Money;

use crate::api::Cart;
use crate::config::PricingConfig;

/// Subtotal, flat shipping, flat-rate tax and their sum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Totals {
    pub subtotal: Money,
    pub shipping: Money,
    pub tax: Money,
    pub total: Money,
}

/// Outcome of comparing the advisory total with the service's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    Matches,
    Differs { advisory: Money, authoritative: Money },
}

impl Totals {
    /// Totals for `cart`, or `None` when there is nothing to price.
    ///
    /// ```rust,ignore
    /// // 10.00 x 2 + 5.00 x 1 at the default pricing
    /// let totals = Totals::for_cart(&cart, &PricingConfig::default()).unwrap();
    /// assert_eq!(totals.total.to_string(), "36.75");
    /// ```
    #[must_use]
    pub fn for_cart(cart: &Cart, pricing: &PricingConfig) -> Option<Self> {
        if cart.is_empty() {
            return None;
        }
        Some(Self::from_subtotal(cart.subtotal(), pricing))
    }

    #[must_use]
    pub fn from_subtotal(subtotal: Money, pricing: &PricingConfig) -> Self {
        let shipping = pricing.shipping_flat;
        let tax = subtotal.apply_rate(pricing.tax_rate);
        Self {
            subtotal,
            shipping,
            tax,
            total: subtotal + shipping + tax,
        }
    }

    /// Compare against the total the service recorded for the order.
    #[must_use]
    pub fn reconcile(&self, authoritative: Money) -> Reconciliation {
        if self.total == authoritative {
            return Reconciliation::Matches;
        }
        tracing::warn!(
            advisory = %self.total,
            authoritative = %authoritative,
            "Advisory total differs from order total"
        );
        Reconciliation::Differs {
            advisory: self.total,
            authoritative,
        }
    }
}
