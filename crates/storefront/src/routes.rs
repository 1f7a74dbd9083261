//! Navigation targets.

use std::fmt;

use larder_core::OrderId;

/// A place the presentation layer can navigate to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Login,
    Register,
    Products,
    Cart,
    Checkout,
    Orders,
    OrderDetail(OrderId),
}

impl Route {
    #[must_use]
    pub fn path(&self) -> String {
        match self {
            Self::Login => "/login".to_string(),
            Self::Register => "/register".to_string(),
            Self::Products => "/products".to_string(),
            Self::Cart => "/cart".to_string(),
            Self::Checkout => "/checkout".to_string(),
            Self::Orders => "/orders".to_string(),
            Self::OrderDetail(id) => format!("/orders/{id}"),
        }
    }

    /// Whether the route needs a signed-in identity.
    #[must_use]
    pub const fn is_protected(&self) -> bool {
        matches!(
            self,
            Self::Cart | Self::Checkout | Self::Orders | Self::OrderDetail(_)
        )
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}
