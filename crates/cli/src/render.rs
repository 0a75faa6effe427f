//! Plain-text rendering of core types.

use std::fmt::Write;

use medusa_store_core::Money;
use medusa_store_storefront::gateway::{Cart, Order, Product, ProductPage, Totals};

/// One line per product: handle, title, starting price.
pub fn product_page(page: &ProductPage) -> String {
    if page.products.is_empty() {
        return "No products found.".to_string();
    }

    let mut out = String::new();
    for product in &page.products {
        let price = product
            .display_price()
            .map_or_else(|| "-".to_string(), Money::display);
        let _ = writeln!(out, "{:<24} {:<32} {price}", product.handle, product.title);
    }
    let first = u64::from(page.offset) + 1;
    let shown = u64::from(page.offset) + page.products.len() as u64;
    let _ = write!(out, "Showing {first}-{shown} of {}", page.count);
    out
}

/// Product details with every variant's id and price.
pub fn product(product: &Product) -> String {
    let mut out = format!("{} ({})\n", product.title, product.handle);
    if let Some(description) = &product.description {
        let _ = writeln!(out, "\n{description}\n");
    }
    for variant in &product.variants {
        let price = variant
            .prices
            .first()
            .map_or_else(|| "-".to_string(), Money::display);
        let _ = writeln!(out, "  {:<24} {:<20} {price}", variant.id, variant.title);
    }
    out.trim_end().to_string()
}

/// Cart lines and totals.
///
/// Shows the backend's totals when present, else an estimate from the lines.
pub fn cart(cart: &Cart) -> String {
    if cart.is_empty() {
        return "Your cart is empty.".to_string();
    }

    let mut out = String::new();
    for item in &cart.items {
        let title = item
            .variant_title
            .as_ref()
            .map_or_else(|| item.title.clone(), |v| format!("{} / {v}", item.title));
        let _ = writeln!(
            out,
            "{:<24} {:<32} x{:<3} {}",
            item.id,
            title,
            item.quantity,
            cart.money(item.line_total).display()
        );
    }

    match cart.totals {
        Some(totals) => out.push_str(&totals_block(&totals, |amount| cart.money(amount))),
        None => {
            let _ = write!(
                out,
                "Subtotal (estimated): {}",
                cart.money(cart.estimated_subtotal()).display()
            );
        }
    }
    out
}

/// Order confirmation.
pub fn order(order: &Order) -> String {
    let money = |amount| Money::new(amount, order.currency_code.clone());
    let mut out = format!("Order {}\n", order.label());
    if let Some(email) = &order.email {
        let _ = writeln!(out, "Confirmation sent to {email}");
    }
    if let Some(created_at) = order.created_at {
        let _ = writeln!(out, "Placed {}", created_at.format("%Y-%m-%d %H:%M UTC"));
    }
    for item in &order.items {
        let _ = writeln!(
            out,
            "  {:<32} x{:<3} {}",
            item.title,
            item.quantity,
            money(item.line_total).display()
        );
    }
    if let Some(totals) = &order.totals {
        out.push_str(&totals_block(totals, money));
    }
    out.trim_end().to_string()
}

fn totals_block(totals: &Totals, money: impl Fn(i64) -> Money) -> String {
    format!(
        "Subtotal: {}\nShipping: {}\nTax:      {}\nTotal:    {}",
        money(totals.subtotal).display(),
        money(totals.shipping_total).display(),
        money(totals.tax_total).display(),
        money(totals.total).display()
    )
}
