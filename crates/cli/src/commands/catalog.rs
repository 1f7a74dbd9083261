//! Catalog browsing commands.
//!
//! # Usage
//!
//! ```bash
//! larder products list
//! larder products list --category 2
//! larder products list --search "green tea"
//! larder products show 10
//! larder categories
//! ```

use std::io::Write;

use larder_core::{CategoryId, ProductId};
use larder_storefront::AppState;
use larder_storefront::api::{Product, ProductQuery};

use super::{CliError, Settled};

/// List products, optionally by category or search term.
pub async fn list(
    app: &AppState,
    category: Option<i64>,
    search: Option<String>,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let state = match category {
        Some(id) => {
            app.catalog()
                .load_products_by_category(CategoryId::new(id))
                .await
        }
        None => {
            app.catalog()
                .load_products(&ProductQuery { search })
                .await
        }
    }
    .settled()?;

    if state.products.is_empty() {
        writeln!(out, "No products found.")?;
        return Ok(());
    }
    for product in &state.products {
        write_product_row(product, out)?;
    }
    Ok(())
}

/// Show one product in detail.
pub async fn show(app: &AppState, id: i64, out: &mut impl Write) -> Result<(), CliError> {
    let state = app
        .catalog()
        .load_product(ProductId::new(id))
        .await
        .settled()?;
    let product = state
        .product
        .ok_or_else(|| CliError::NotFound(format!("product {id}")))?;

    writeln!(out, "{} (#{})", product.name, product.id)?;
    writeln!(out, "  Price:  {}", product.price)?;
    writeln!(out, "  Stock:  {}", stock_label(&product))?;
    if let (Some(rating), Some(reviews)) = (product.rating, product.review_count) {
        writeln!(out, "  Rating: {rating} ({reviews} reviews)")?;
    }
    if !product.description.is_empty() {
        writeln!(out)?;
        writeln!(out, "{}", product.description)?;
    }
    Ok(())
}

/// List product categories.
pub async fn categories(app: &AppState, out: &mut impl Write) -> Result<(), CliError> {
    let state = app.catalog().load_categories().await.settled()?;

    for category in &state.categories {
        match category.description.as_deref() {
            Some(description) if !description.is_empty() => {
                writeln!(
                    out,
                    "{:>5}  {}  - {description}",
                    category.id.to_string(),
                    category.name
                )?;
            }
            _ => writeln!(out, "{:>5}  {}", category.id.to_string(), category.name)?,
        }
    }
    Ok(())
}

fn write_product_row(product: &Product, out: &mut impl Write) -> std::io::Result<()> {
    writeln!(
        out,
        "{:>5}  {:<32} {:>10}  {}",
        product.id.to_string(),
        product.name,
        product.price.to_string(),
        stock_label(product)
    )
}

fn stock_label(product: &Product) -> String {
    match product.stock {
        _ if !product.in_stock() => "out of stock".to_string(),
        Some(stock) => format!("{stock} in stock"),
        None => "available".to_string(),
    }
}
