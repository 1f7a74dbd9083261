//! Positive line-item quantities.

use core::fmt;
use core::num::NonZeroU32;

use serde::{Deserialize, Serialize};

/// Errors that can occur when constructing a [`Quantity`].
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityError {
    /// Zero or negative quantities are never sent to the backing service.
    #[error("quantity must be at least 1 (got {0})")]
    NotPositive(i64),
    /// The value does not fit the wire representation.
    #[error("quantity {0} is too large")]
    TooLarge(i64),
}

/// A cart or order line quantity. Always at least one.
///
/// Decrementing a quantity of one is rejected instead of removing the line;
/// removal is an explicit, separate operation.
///
/// ```
/// use larder_core::Quantity;
///
/// assert!(Quantity::new(3).is_ok());
/// assert!(Quantity::new(0).is_err());
/// assert!(Quantity::new(-1).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Quantity(NonZeroU32);

impl Quantity {
    /// A single unit.
    pub const ONE: Self = Self(NonZeroU32::MIN);

    /// Validate a signed quantity as produced by `current + delta` arithmetic.
    ///
    /// # Errors
    ///
    /// Returns `QuantityError::NotPositive` for values below one and
    /// `QuantityError::TooLarge` for values beyond `u32::MAX`.
    pub fn new(value: i64) -> Result<Self, QuantityError> {
        if value <= 0 {
            return Err(QuantityError::NotPositive(value));
        }
        u32::try_from(value)
            .ok()
            .and_then(NonZeroU32::new)
            .map(Self)
            .ok_or(QuantityError::TooLarge(value))
    }

    /// The quantity as an unsigned integer.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0.get()
    }

    /// Apply a signed step (the `+`/`-` buttons of a cart row).
    ///
    /// # Errors
    ///
    /// Returns an error if the result would drop below one.
    pub fn step(self, delta: i64) -> Result<Self, QuantityError> {
        Self::new(i64::from(self.get()) + delta)
    }
}

impl Default for Quantity {
    fn default() -> Self {
        Self::ONE
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<i64> for Quantity {
    type Error = QuantityError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Quantity> for i64 {
    fn from(quantity: Quantity) -> Self {
        Self::from(quantity.get())
    }
}
