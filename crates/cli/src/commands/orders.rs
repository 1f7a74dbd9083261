//! Order history commands.

use std::io::Write;

use larder_core::OrderId;
use larder_storefront::AppState;
use larder_storefront::api::Order;
use larder_storefront::checkout::Reconciliation;

use super::{CliError, Settled};

pub async fn list(app: &AppState, out: &mut impl Write) -> Result<(), CliError> {
    let state = app
        .open_orders()
        .await
        .into_view()
        .ok_or(CliError::MissingProfile("user-id", "ID"))?
        .settled()?;

    if state.orders.is_empty() {
        writeln!(out, "No orders yet.")?;
        return Ok(());
    }
    for order in &state.orders {
        writeln!(
            out,
            "{:>6}  {}  {:<10} {:>10}",
            order.id.to_string(),
            order.created_at.format("%Y-%m-%d"),
            order.status.to_string(),
            order.total_amount.to_string()
        )?;
    }
    Ok(())
}

/// Show one order with its line snapshots and a totals check.
pub async fn show(app: &AppState, id: i64, out: &mut impl Write) -> Result<(), CliError> {
    let order = load(app, OrderId::new(id)).await?;
    write_order(app, &order, out)
}

/// Cancel a pending order. Orders past `pending` are refused locally.
pub async fn cancel(app: &AppState, id: i64, out: &mut impl Write) -> Result<(), CliError> {
    let id = OrderId::new(id);
    load(app, id).await?;

    let state = app.orders().cancel_order(id).await?.settled()?;
    let order = state
        .find(id)
        .ok_or_else(|| CliError::NotFound(format!("order {id}")))?;

    writeln!(out, "Order {} is now {}.", order.id, order.status)?;
    Ok(())
}

async fn load(app: &AppState, id: OrderId) -> Result<Order, CliError> {
    app.open_order(id)
        .await
        .into_view()
        .ok_or(CliError::MissingProfile("user-id", "ID"))?
        .settled()?
        .order
        .filter(|order| order.id == id)
        .ok_or_else(|| CliError::NotFound(format!("order {id}")))
}

pub(super) fn write_order(app: &AppState, order: &Order, out: &mut impl Write) -> Result<(), CliError> {
    writeln!(out, "Order #{} ({})", order.id, order.status)?;
    if let Some(reference) = order.order_id {
        writeln!(out, "  Reference: {reference}")?;
    }
    writeln!(out, "  Placed:    {}", order.created_at.format("%Y-%m-%d %H:%M UTC"))?;
    writeln!(out, "  Ship to:   {}", order.shipping_address)?;
    if let Some(method) = order.shipping_method {
        writeln!(out, "  Shipping:  {method}")?;
    }
    if let Some(method) = order.payment_method {
        writeln!(out, "  Payment:   {}", method.label())?;
    }
    writeln!(out)?;

    for line in &order.items {
        writeln!(
            out,
            "  {:<32} {:>3} x {:>8} = {:>10}",
            line.product_name,
            line.quantity.get(),
            line.price.to_string(),
            line.line_total().to_string()
        )?;
    }
    writeln!(out, "  {:<50} {:>10}", "Total", order.total_amount.to_string())?;

    if let Reconciliation::Differs { advisory, .. } = app.reconcile_order(order) {
        writeln!(out, "  (estimated at checkout: {advisory})")?;
    }
    if order.can_cancel() {
        writeln!(out)?;
        writeln!(out, "This order can still be cancelled.")?;
    }
    Ok(())
}
