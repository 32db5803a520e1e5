//! Order endpoints (/orders) and sales totals

use anyhow::{bail, Context, Result};

use super::client::StoreClient;
use super::products::fetch_products;
use crate::models::{Cart, Order, SalesStats};

/// Parse a `<product id>:<qty>` cart line.
pub fn parse_cart_line(s: &str) -> std::result::Result<(u64, u32), String> {
    let (id, qty) = s
        .split_once(':')
        .ok_or_else(|| format!("expected <product id>:<qty>, got {:?}", s))?;
    let id = id
        .trim()
        .parse()
        .map_err(|_| format!("invalid product id {:?}", id))?;
    let qty = qty
        .trim()
        .parse()
        .map_err(|_| format!("invalid quantity {:?}", qty))?;
    Ok((id, qty))
}

pub async fn fetch_orders(client: &StoreClient) -> Result<Vec<Order>> {
    client.get("/orders", true).await
}

/// List orders, newest first (admin)
pub async fn list_orders(client: &StoreClient) -> Result<()> {
    let orders = fetch_orders(client).await?;

    if orders.is_empty() {
        println!("No orders.");
        return Ok(());
    }

    println!();
    for o in &orders {
        let items: u32 = o.items.iter().map(|i| i.qty).sum();
        println!(
            "{:>6}  {:<26} {:>3} item(s) {:>10.2}  {}",
            o.id, o.date, items, o.total, o.status
        );
    }
    Ok(())
}

/// Build a cart from active products and place it as an order
pub async fn place_order(client: &StoreClient, lines: &[(u64, u32)]) -> Result<()> {
    let products = fetch_products(client, true).await?;

    let mut cart = Cart::default();
    for &(id, qty) in lines {
        let product = products
            .iter()
            .find(|p| p.id == id)
            .with_context(|| format!("No active product with id {}", id))?;
        cart.add(product, qty)
            .with_context(|| format!("Quantity for product {} is too large", id))?;
    }
    if cart.is_empty() {
        bail!("Cart is empty.");
    }

    tracing::info!("Placing order for {} item(s)...", cart.count());
    let body = serde_json::json!({ "cartItems": cart.items() });
    let order: Order = client.post("/orders", &body, false).await?;

    let expected = cart.total();
    if (order.total - expected).abs() > 0.005 {
        tracing::warn!(
            "Order total {:.2} differs from cart total {:.2}",
            order.total,
            expected
        );
    }

    println!("Order {} placed: {} item(s), total {:.2}", order.id, cart.count(), order.total);
    Ok(())
}

/// Print sales totals computed from all orders (admin)
pub async fn show_stats(client: &StoreClient) -> Result<()> {
    let orders = fetch_orders(client).await?;
    let stats = SalesStats::from_orders(&orders);

    println!();
    println!("Orders:      {}", stats.total_orders);
    println!("Revenue:     {:.2}", stats.total_revenue);
    println!("Items sold:  {}", stats.total_items_sold);

    if !stats.product_sales.is_empty() {
        println!();
        let mut rows: Vec<_> = stats.product_sales.iter().collect();
        rows.sort_by(|a, b| b.1.revenue.total_cmp(&a.1.revenue));
        for (id, sales) in rows {
            println!(
                "{:>5}  {:<32} {:>5} sold {:>10.2}",
                id, sales.name, sales.qty, sales.revenue
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cart_line() {
        assert_eq!(parse_cart_line("12:3"), Ok((12, 3)));
        assert_eq!(parse_cart_line(" 4 : 1 "), Ok((4, 1)));
        assert!(parse_cart_line("12").is_err());
        assert!(parse_cart_line("x:1").is_err());
        assert!(parse_cart_line("1:-2").is_err());
    }
}
