//! Session gate for protected views.
//!
//! A UX guard, not a security boundary: it only checks that an identity is
//! present. The service still authorizes every request.

use super::Identity;
use crate::routes::Route;

/// Result of passing a protected view through the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gated<V> {
    Render(V),
    Redirect(Route),
}

impl<V> Gated<V> {
    #[must_use]
    pub const fn is_redirect(&self) -> bool {
        matches!(self, Self::Redirect(_))
    }

    /// The rendered view, if the gate let it through.
    #[must_use]
    pub fn into_view(self) -> Option<V> {
        match self {
            Self::Render(view) => Some(view),
            Self::Redirect(_) => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(V) -> U) -> Gated<U> {
        match self {
            Self::Render(view) => Gated::Render(f(view)),
            Self::Redirect(route) => Gated::Redirect(route),
        }
    }
}

/// Render `view` for the signed-in identity, or redirect to login.
///
/// ```rust,ignore
/// let gated = require_identity(session.identity().as_ref(), |who| who.display_name());
/// ```
pub fn require_identity<V>(
    identity: Option<&Identity>,
    view: impl FnOnce(&Identity) -> V,
) -> Gated<V> {
    identity.map_or(Gated::Redirect(Route::Login), |identity| {
        Gated::Render(view(identity))
    })
}
