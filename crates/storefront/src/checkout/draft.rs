//! Checkout draft: shipping and payment input accumulated across steps.

use std::fmt;

use larder_core::{PaymentMethod, ShippingMethod, UserId};

use crate::api::CreateOrderRequest;
use crate::error::ValidationError;
use crate::session::Identity;

/// Shipping address fields as entered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShippingDetails {
    pub full_name: String,
    pub address: String,
    pub city: String,
    /// State, province or region. Optional.
    pub state: String,
    pub zip_code: String,
    pub country: String,
    pub phone: String,
}

impl ShippingDetails {
    /// The flattened address sent with the order.
    ///
    /// ```rust,ignore
    /// assert_eq!(details.address_line(), "1 Main St, Springfield, IL, 62701, US");
    /// ```
    #[must_use]
    pub fn address_line(&self) -> String {
        format!(
            "{}, {}, {}, {}, {}",
            self.address, self.city, self.state, self.zip_code, self.country
        )
    }

    /// Labels of required fields left blank, in form order.
    #[must_use]
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("full name", &self.full_name),
            ("address", &self.address),
            ("city", &self.city),
            ("zip code", &self.zip_code),
            ("country", &self.country),
            ("phone", &self.phone),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(label, _)| label)
        .collect()
    }

    fn merge(&mut self, update: ShippingUpdate) {
        let ShippingUpdate {
            full_name,
            address,
            city,
            state,
            zip_code,
            country,
            phone,
        } = update;
        merge_field(&mut self.full_name, full_name);
        merge_field(&mut self.address, address);
        merge_field(&mut self.city, city);
        merge_field(&mut self.state, state);
        merge_field(&mut self.zip_code, zip_code);
        merge_field(&mut self.country, country);
        merge_field(&mut self.phone, phone);
    }
}

/// Card fields. Collected only when paying by card and never transmitted.
///
/// Implements `Debug` manually to redact the card number and CVV.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct PaymentDetails {
    pub card_number: String,
    pub name_on_card: String,
    /// `MM/YY`.
    pub expiry_date: String,
    pub cvv: String,
}

impl fmt::Debug for PaymentDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaymentDetails")
            .field("card_number", &"[REDACTED]")
            .field("name_on_card", &self.name_on_card)
            .field("expiry_date", &self.expiry_date)
            .field("cvv", &"[REDACTED]")
            .finish()
    }
}

impl PaymentDetails {
    /// Check the card fields for completeness and shape.
    ///
    /// # Errors
    ///
    /// `MissingFields` when any field is blank, otherwise `Card` naming the
    /// first malformed field.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let missing: Vec<&'static str> = [
            ("card number", &self.card_number),
            ("name on card", &self.name_on_card),
            ("expiry date", &self.expiry_date),
            ("CVV", &self.cvv),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(label, _)| label)
        .collect();
        if !missing.is_empty() {
            return Err(ValidationError::MissingFields(missing));
        }

        let digits: String = self.card_number.chars().filter(|c| *c != ' ').collect();
        if !(12..=19).contains(&digits.len()) || !all_digits(&digits) {
            return Err(ValidationError::Card("card number must be 12 to 19 digits"));
        }
        if !valid_expiry(self.expiry_date.trim()) {
            return Err(ValidationError::Card("expiry date must be MM/YY"));
        }
        let cvv = self.cvv.trim();
        if !(3..=4).contains(&cvv.len()) || !all_digits(cvv) {
            return Err(ValidationError::Card("CVV must be 3 or 4 digits"));
        }
        Ok(())
    }

    fn merge(&mut self, update: PaymentUpdate) {
        let PaymentUpdate {
            card_number,
            name_on_card,
            expiry_date,
            cvv,
        } = update;
        merge_field(&mut self.card_number, card_number);
        merge_field(&mut self.name_on_card, name_on_card);
        merge_field(&mut self.expiry_date, expiry_date);
        merge_field(&mut self.cvv, cvv);
    }
}

/// Partial shipping edit. `Some` fields overwrite, `None` fields are kept.
#[derive(Debug, Clone, Default)]
pub struct ShippingUpdate {
    pub full_name: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub country: Option<String>,
    pub phone: Option<String>,
}

/// Partial card edit. `Some` fields overwrite, `None` fields are kept.
#[derive(Clone, Default)]
pub struct PaymentUpdate {
    pub card_number: Option<String>,
    pub name_on_card: Option<String>,
    pub expiry_date: Option<String>,
    pub cvv: Option<String>,
}

/// Everything the checkout has collected so far.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckoutDraft {
    pub shipping: ShippingDetails,
    pub shipping_method: ShippingMethod,
    pub payment_method: PaymentMethod,
    pub payment: PaymentDetails,
}

impl CheckoutDraft {
    /// Draft pre-filled from the signed-in profile.
    ///
    /// Name, address and phone are copied only when both first and last
    /// name are known.
    #[must_use]
    pub fn for_identity(identity: &Identity) -> Self {
        let mut draft = Self::default();
        if let (Some(first), Some(last)) = (
            non_blank(identity.first_name.as_deref()),
            non_blank(identity.last_name.as_deref()),
        ) {
            draft.shipping.full_name = format!("{first} {last}");
            draft.shipping.address = identity.address.clone().unwrap_or_default();
            draft.shipping.phone = identity.phone.clone().unwrap_or_default();
        }
        draft
    }

    pub(crate) fn merge_shipping(&mut self, update: ShippingUpdate) {
        self.shipping.merge(update);
    }

    pub(crate) fn merge_payment(&mut self, update: PaymentUpdate) {
        self.payment.merge(update);
    }

    /// Check the whole draft before submission.
    ///
    /// # Errors
    ///
    /// `MissingFields` for blank required shipping fields, then the card
    /// errors from [`PaymentDetails::validate`] when paying by card.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let missing = self.shipping.missing_fields();
        if !missing.is_empty() {
            return Err(ValidationError::MissingFields(missing));
        }
        if self.payment_method.requires_card() {
            self.payment.validate()?;
        }
        Ok(())
    }

    /// The order-creation request for `user`. Card fields are not included.
    #[must_use]
    pub fn order_request(&self, user: UserId) -> CreateOrderRequest {
        CreateOrderRequest {
            user_id: user,
            shipping_address: self.shipping.address_line(),
            shipping_method: self.shipping_method,
            payment_method: self.payment_method,
        }
    }
}

fn merge_field(field: &mut String, update: Option<String>) {
    if let Some(value) = update {
        *field = value;
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn all_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn valid_expiry(s: &str) -> bool {
    let Some((month, year)) = s.split_once('/') else {
        return false;
    };
    month.len() == 2
        && year.len() == 2
        && all_digits(month)
        && all_digits(year)
        && month.parse::<u8>().is_ok_and(|m| (1..=12).contains(&m))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use larder_core::Email;

    use super::*;

    fn shipping() -> ShippingDetails {
        ShippingDetails {
            full_name: "Ada Lovelace".to_string(),
            address: "1 Main St".to_string(),
            city: "Springfield".to_string(),
            state: "IL".to_string(),
            zip_code: "62701".to_string(),
            country: "US".to_string(),
            phone: "555-0100".to_string(),
        }
    }

    fn card() -> PaymentDetails {
        PaymentDetails {
            card_number: "4242 4242 4242 4242".to_string(),
            name_on_card: "Ada Lovelace".to_string(),
            expiry_date: "09/29".to_string(),
            cvv: "123".to_string(),
        }
    }

    #[test]
    fn test_address_line() {
        assert_eq!(
            shipping().address_line(),
            "1 Main St, Springfield, IL, 62701, US"
        );
    }

    #[test]
    fn test_state_is_optional() {
        let details = ShippingDetails {
            state: String::new(),
            ..shipping()
        };
        assert!(details.missing_fields().is_empty());
        assert_eq!(details.address_line(), "1 Main St, Springfield, , 62701, US");
    }

    #[test]
    fn test_missing_fields_in_form_order() {
        let details = ShippingDetails {
            city: "  ".to_string(),
            phone: String::new(),
            ..shipping()
        };
        assert_eq!(details.missing_fields(), vec!["city", "phone"]);
    }

    #[test]
    fn test_merge_only_overwrites_some() {
        let mut draft = CheckoutDraft {
            shipping: shipping(),
            ..CheckoutDraft::default()
        };
        draft.merge_shipping(ShippingUpdate {
            city: Some("Shelbyville".to_string()),
            ..ShippingUpdate::default()
        });
        assert_eq!(draft.shipping.city, "Shelbyville");
        assert_eq!(draft.shipping.address, "1 Main St");
    }

    #[test]
    fn test_card_required_only_for_card_payment() {
        let mut draft = CheckoutDraft {
            shipping: shipping(),
            ..CheckoutDraft::default()
        };
        assert_eq!(draft.payment_method, PaymentMethod::CreditCard);
        assert!(matches!(
            draft.validate(),
            Err(ValidationError::MissingFields(fields)) if fields.len() == 4
        ));

        draft.payment_method = PaymentMethod::BankTransfer;
        assert!(draft.validate().is_ok());

        draft.payment_method = PaymentMethod::CreditCard;
        draft.payment = card();
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn test_card_shape_checks() {
        let cases = [
            (PaymentDetails { card_number: "4242".to_string(), ..card() }, "card number"),
            (PaymentDetails { card_number: "4242-4242-4242-4242".to_string(), ..card() }, "card number"),
            (PaymentDetails { expiry_date: "13/29".to_string(), ..card() }, "expiry"),
            (PaymentDetails { expiry_date: "0929".to_string(), ..card() }, "expiry"),
            (PaymentDetails { cvv: "12".to_string(), ..card() }, "CVV"),
            (PaymentDetails { cvv: "12a".to_string(), ..card() }, "CVV"),
        ];
        for (details, expected) in cases {
            match details.validate() {
                Err(ValidationError::Card(message)) => {
                    assert!(message.contains(expected), "{message} should mention {expected}");
                }
                other => panic!("expected card error for {expected}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_payment_debug_redacts() {
        let output = format!("{:?}", card());
        assert!(!output.contains("4242"));
        assert!(!output.contains("123"));
        assert!(output.contains("Ada Lovelace"));
    }

    #[test]
    fn test_order_request_never_carries_card() {
        let draft = CheckoutDraft {
            shipping: shipping(),
            payment_method: PaymentMethod::CreditCard,
            payment: card(),
            ..CheckoutDraft::default()
        };
        let request = draft.order_request(UserId::new(9));
        let json = serde_json::to_string(&request).unwrap();

        assert_eq!(request.shipping_method, ShippingMethod::Standard);
        assert!(!json.contains("4242"));
        assert!(json.contains("credit_card"));
    }

    #[test]
    fn test_prefill_requires_full_name() {
        let mut identity = Identity {
            id: UserId::new(9),
            first_name: Some("Ada".to_string()),
            last_name: Some("Lovelace".to_string()),
            email: Email::parse("ada@example.com").unwrap(),
            address: Some("1 Main St".to_string()),
            phone: None,
        };
        let draft = CheckoutDraft::for_identity(&identity);
        assert_eq!(draft.shipping.full_name, "Ada Lovelace");
        assert_eq!(draft.shipping.address, "1 Main St");
        assert_eq!(draft.shipping.phone, "");

        identity.last_name = None;
        assert_eq!(CheckoutDraft::for_identity(&identity), CheckoutDraft::default());
    }
}
