//! Signed-in identity and the credential forms that precede it.
//!
//! The backing service owns authentication. This module only remembers who
//! is signed in and rejects obviously malformed form input before it is sent.

mod gate;

use std::fmt;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::info;

use larder_core::{Email, UserId};

pub use gate::{Gated, require_identity};

use crate::error::{ValidationError, clear_sentry_user, set_sentry_user};

/// Minimum password length accepted by the forms.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// The signed-in user's profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: UserId,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    pub email: Email,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

impl Identity {
    /// Full name when known, otherwise the email address.
    #[must_use]
    pub fn display_name(&self) -> String {
        match (self.first_name.as_deref(), self.last_name.as_deref()) {
            (Some(first), Some(last)) => format!("{first} {last}"),
            (Some(name), None) | (None, Some(name)) => name.to_string(),
            (None, None) => self.email.to_string(),
        }
    }
}

/// Holds the current identity, if any.
#[derive(Debug)]
pub struct Session {
    identity: watch::Sender<Option<Identity>>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    #[must_use]
    pub fn new() -> Self {
        Self {
            identity: watch::Sender::new(None),
        }
    }

    pub fn sign_in(&self, identity: Identity) {
        info!(user_id = %identity.id, "Signed in");
        set_sentry_user(&identity.id, Some(identity.email.as_str()));
        self.identity.send_replace(Some(identity));
    }

    pub fn sign_out(&self) {
        if let Some(previous) = self.identity.send_replace(None) {
            info!(user_id = %previous.id, "Signed out");
        }
        clear_sentry_user();
    }

    #[must_use]
    pub fn identity(&self) -> Option<Identity> {
        self.identity.borrow().clone()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.identity.borrow().is_some()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<Identity>> {
        self.identity.subscribe()
    }
}

/// Sign-in form input.
#[derive(Clone, Default)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for LoginForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginForm")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Sign-in input that passed local checks.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

impl LoginForm {
    /// # Errors
    ///
    /// `MissingFields` for a blank username, `PasswordMissing` for a blank
    /// password.
    pub fn validate(self) -> Result<Credentials, ValidationError> {
        let username = self.username.trim();
        if username.is_empty() {
            return Err(ValidationError::MissingFields(vec!["username"]));
        }
        if self.password.is_empty() {
            return Err(ValidationError::PasswordMissing);
        }
        Ok(Credentials {
            username: username.to_string(),
            password: SecretString::from(self.password),
        })
    }
}

/// Account registration form input.
#[derive(Clone, Default)]
pub struct RegistrationForm {
    pub username: String,
    pub email: String,
    pub password: String,
    pub password_confirmation: String,
    pub first_name: String,
    pub last_name: String,
}

impl fmt::Debug for RegistrationForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationForm")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .field("password_confirmation", &"[REDACTED]")
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .finish()
    }
}

/// Registration input that passed local checks.
#[derive(Debug, Clone)]
pub struct Registration {
    pub username: String,
    pub email: Email,
    pub password: SecretString,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl RegistrationForm {
    /// Checks run in form order and the first failure is returned.
    ///
    /// # Errors
    ///
    /// - `MissingFields` for a blank username
    /// - `Email` for a blank or malformed email
    /// - `PasswordMissing` or `PasswordTooShort` for a weak password
    /// - `PasswordMismatch` when the confirmation differs
    pub fn validate(self) -> Result<Registration, ValidationError> {
        let username = self.username.trim();
        if username.is_empty() {
            return Err(ValidationError::MissingFields(vec!["username"]));
        }
        let email = Email::parse(self.email.trim())?;
        if self.password.is_empty() {
            return Err(ValidationError::PasswordMissing);
        }
        if self.password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(ValidationError::PasswordTooShort {
                min: MIN_PASSWORD_LENGTH,
            });
        }
        if self.password != self.password_confirmation {
            return Err(ValidationError::PasswordMismatch);
        }

        Ok(Registration {
            username: username.to_string(),
            email,
            password: SecretString::from(self.password),
            first_name: optional(&self.first_name),
            last_name: optional(&self.last_name),
        })
    }
}

fn optional(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use larder_core::EmailError;
    use secrecy::ExposeSecret;

    use super::*;

    fn registration() -> RegistrationForm {
        RegistrationForm {
            username: "ada".to_string(),
            email: "ada@example.com".to_string(),
            password: "analytical".to_string(),
            password_confirmation: "analytical".to_string(),
            first_name: "Ada".to_string(),
            last_name: " ".to_string(),
        }
    }

    fn identity() -> Identity {
        Identity {
            id: UserId::new(9),
            first_name: Some("Ada".to_string()),
            last_name: None,
            email: Email::parse("ada@example.com").unwrap(),
            address: None,
            phone: None,
        }
    }

    #[test]
    fn test_session_sign_in_and_out() {
        let session = Session::new();
        assert!(!session.is_authenticated());

        session.sign_in(identity());
        assert_eq!(session.identity().unwrap().id, UserId::new(9));

        session.sign_out();
        assert!(session.identity().is_none());
        // Signing out twice is harmless.
        session.sign_out();
    }

    #[test]
    fn test_display_name() {
        let mut identity = identity();
        assert_eq!(identity.display_name(), "Ada");
        identity.last_name = Some("Lovelace".to_string());
        assert_eq!(identity.display_name(), "Ada Lovelace");
        identity.first_name = None;
        identity.last_name = None;
        assert_eq!(identity.display_name(), "ada@example.com");
    }

    #[test]
    fn test_registration_valid() {
        let registration = registration().validate().unwrap();
        assert_eq!(registration.email.as_str(), "ada@example.com");
        assert_eq!(registration.password.expose_secret(), "analytical");
        assert_eq!(registration.first_name.as_deref(), Some("Ada"));
        assert!(registration.last_name.is_none());
    }

    #[test]
    fn test_registration_checks_in_order() {
        let form = RegistrationForm {
            username: String::new(),
            email: "nope".to_string(),
            ..registration()
        };
        assert_eq!(
            form.validate().unwrap_err(),
            ValidationError::MissingFields(vec!["username"])
        );

        let form = RegistrationForm {
            email: "ada@localhost".to_string(),
            ..registration()
        };
        assert_eq!(
            form.validate().unwrap_err(),
            ValidationError::Email(EmailError::Malformed)
        );

        let form = RegistrationForm {
            password: "abc".to_string(),
            password_confirmation: "abc".to_string(),
            ..registration()
        };
        assert_eq!(
            form.validate().unwrap_err(),
            ValidationError::PasswordTooShort { min: 6 }
        );

        let form = RegistrationForm {
            password_confirmation: "analytics".to_string(),
            ..registration()
        };
        assert_eq!(form.validate().unwrap_err(), ValidationError::PasswordMismatch);
    }

    #[test]
    fn test_login_form() {
        let form = LoginForm {
            username: " ada ".to_string(),
            password: "secret-ish".to_string(),
        };
        let debug = format!("{form:?}");
        assert!(!debug.contains("secret-ish"));

        let credentials = form.validate().unwrap();
        assert_eq!(credentials.username, "ada");

        let form = LoginForm {
            username: "ada".to_string(),
            password: String::new(),
        };
        assert_eq!(form.validate().unwrap_err(), ValidationError::PasswordMissing);
    }
}
