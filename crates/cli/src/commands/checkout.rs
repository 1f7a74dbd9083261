//! One-shot checkout: fill the wizard from flags, review, submit.

use std::io::Write;

use larder_core::{PaymentMethod, ShippingMethod};
use larder_storefront::AppState;
use larder_storefront::checkout::{PaymentUpdate, ShippingUpdate};

use super::CliError;

/// Flag values for every checkout step.
pub struct CheckoutInput {
    pub shipping: ShippingUpdate,
    pub shipping_method: ShippingMethod,
    pub payment_method: PaymentMethod,
    pub payment: PaymentUpdate,
}

/// Walk the wizard to review and place the order.
pub async fn run(app: &AppState, input: CheckoutInput, out: &mut impl Write) -> Result<(), CliError> {
    let mut checkout = app
        .begin_checkout()
        .await
        .into_view()
        .ok_or(CliError::MissingProfile("user-id", "ID"))?;

    checkout.update_shipping(input.shipping);
    checkout.set_shipping_method(input.shipping_method);
    checkout.next();

    checkout.set_payment_method(input.payment_method);
    if input.payment_method.requires_card() {
        checkout.update_payment_details(input.payment);
    }
    checkout.next();

    writeln!(out, "{}", checkout.step().label())?;
    if let Some(draft) = checkout.draft() {
        writeln!(out, "  Ship to:  {}", draft.shipping.address_line())?;
        writeln!(out, "  Shipping: {}", draft.shipping_method)?;
        writeln!(out, "  Payment:  {}", draft.payment_method.label())?;
    }
    if let Some(totals) = checkout.totals(&app.carts().snapshot(), &app.config().pricing) {
        writeln!(out, "  Estimated total: {}", totals.total)?;
    }
    writeln!(out)?;

    let order = app.place_order(&mut checkout).await?;

    match checkout.completion_route() {
        Some(route) => writeln!(out, "Order placed ({route}).")?,
        None => writeln!(out, "Order placed.")?,
    }
    super::orders::write_order(app, &order, out)?;
    Ok(())
}
