//! Product endpoints (/products)

use anyhow::{bail, Result};

use super::client::StoreClient;
use crate::models::{Product, ProductFields};

pub fn list_path(active_only: bool) -> &'static str {
    if active_only {
        "/products?activeOnly=true"
    } else {
        "/products"
    }
}

pub async fn fetch_products(client: &StoreClient, active_only: bool) -> Result<Vec<Product>> {
    client.get(list_path(active_only), false).await
}

/// List products
pub async fn list_products(client: &StoreClient, active_only: bool) -> Result<()> {
    let products = fetch_products(client, active_only).await?;

    if products.is_empty() {
        println!("No products.");
        return Ok(());
    }

    println!();
    for p in &products {
        let flag = if p.active { ' ' } else { 'x' };
        let badge = p.badge.as_deref().map(|b| format!(" [{}]", b)).unwrap_or_default();
        println!(
            "{}{:>5}  {:<32} {:>9.2}  {}{}",
            flag, p.id, p.name, p.price, p.category, badge
        );
    }
    println!("\n{} product(s)", products.len());
    Ok(())
}

/// Create a product (admin)
pub async fn add_product(client: &StoreClient, fields: &ProductFields) -> Result<()> {
    if fields.name.as_deref().map_or(true, str::is_empty) {
        bail!("A product name is required.");
    }
    let body = serde_json::to_value(fields)?;
    let product: Product = client.post("/products", &body, true).await?;
    println!("Created product {} ({})", product.id, product.name);
    Ok(())
}

/// Change some fields of a product (admin)
pub async fn update_product(client: &StoreClient, id: u64, fields: &ProductFields) -> Result<()> {
    if fields.is_empty() {
        bail!("Nothing to update; pass at least one field.");
    }
    let body = serde_json::to_value(fields)?;
    let _: serde_json::Value = client.put(&format!("/products/{}", id), &body).await?;
    println!("Updated product {}", id);
    Ok(())
}

/// Delete a product (admin)
pub async fn delete_product(client: &StoreClient, id: u64) -> Result<()> {
    let _: serde_json::Value = client.delete(&format!("/products/{}", id)).await?;
    println!("Deleted product {}", id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_path() {
        assert_eq!(list_path(false), "/products");
        assert_eq!(list_path(true), "/products?activeOnly=true");
    }
}
