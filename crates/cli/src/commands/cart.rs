//! Cart commands.
//!
//! Every command loads the user's cart first so that mutations know which
//! cart to target and refetch.

use std::io::Write;

use larder_core::{CartItemId, ProductId};
use larder_storefront::AppState;
use larder_storefront::api::Cart;
use larder_storefront::stores::CartState;

use super::{CliError, Settled};

/// Print the cart lines and advisory totals.
pub async fn show(app: &AppState, out: &mut impl Write) -> Result<(), CliError> {
    let state = open(app).await?;
    write_cart(app, &state, out)
}

pub async fn add(
    app: &AppState,
    product: i64,
    quantity: i64,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let cart = current_cart(app).await?;
    let state = app
        .carts()
        .add_item(cart.id, ProductId::new(product), quantity)
        .await?
        .settled()?;
    write_cart(app, &state, out)
}

pub async fn set_quantity(
    app: &AppState,
    item: i64,
    quantity: i64,
    out: &mut impl Write,
) -> Result<(), CliError> {
    open(app).await?;
    let state = app
        .carts()
        .update_item_quantity(CartItemId::new(item), quantity)
        .await?
        .settled()?;
    write_cart(app, &state, out)
}

pub async fn remove(app: &AppState, item: i64, out: &mut impl Write) -> Result<(), CliError> {
    open(app).await?;
    let state = app
        .carts()
        .remove_item(CartItemId::new(item))
        .await
        .settled()?;
    write_cart(app, &state, out)
}

pub async fn clear(app: &AppState, out: &mut impl Write) -> Result<(), CliError> {
    let cart = current_cart(app).await?;
    let state = app.carts().clear_cart(cart.id).await.settled()?;
    write_cart(app, &state, out)
}

async fn open(app: &AppState) -> Result<CartState, CliError> {
    app.open_cart()
        .await
        .into_view()
        .ok_or(CliError::MissingProfile("user-id", "ID"))?
        .settled()
}

async fn current_cart(app: &AppState) -> Result<Cart, CliError> {
    open(app)
        .await?
        .cart
        .ok_or_else(|| CliError::NotFound("cart".to_string()))
}

fn write_cart(app: &AppState, state: &CartState, out: &mut impl Write) -> Result<(), CliError> {
    if state.is_empty() {
        writeln!(out, "Your cart is empty.")?;
        return Ok(());
    }

    for item in state.items() {
        writeln!(
            out,
            "{:>5}  {:<32} {:>3} x {:>8} = {:>10}",
            item.id.to_string(),
            item.display_name(),
            item.quantity.get(),
            item.price.to_string(),
            item.line_total().to_string()
        )?;
    }

    if let Some(totals) = app.cart_totals() {
        writeln!(out)?;
        writeln!(out, "{:>52} {:>10}", "Subtotal", totals.subtotal.to_string())?;
        writeln!(out, "{:>52} {:>10}", "Shipping", totals.shipping.to_string())?;
        writeln!(out, "{:>52} {:>10}", "Tax", totals.tax.to_string())?;
        writeln!(out, "{:>52} {:>10}", "Total", totals.total.to_string())?;
    }
    Ok(())
}
