//! Category endpoints (/categories)

use anyhow::{bail, Result};

use super::client::StoreClient;
use crate::models::{Category, DEFAULT_CATEGORY_ICON};

fn category_body(name: &str, icon: Option<&str>) -> Result<serde_json::Value> {
    if name.trim().is_empty() {
        bail!("A category name is required.");
    }
    Ok(serde_json::json!({
        "name": name.trim(),
        "icon": icon.unwrap_or(DEFAULT_CATEGORY_ICON),
    }))
}

/// List categories
pub async fn list_categories(client: &StoreClient) -> Result<()> {
    let categories: Vec<Category> = client.get("/categories", false).await?;

    if categories.is_empty() {
        println!("No categories.");
        return Ok(());
    }

    println!();
    for c in &categories {
        println!("{:>5}  {:<24} {}", c.id, c.name, c.icon);
    }
    Ok(())
}

/// Create a category (admin)
pub async fn add_category(client: &StoreClient, name: &str, icon: Option<&str>) -> Result<()> {
    let body = category_body(name, icon)?;
    let category: Category = client.post("/categories", &body, true).await?;
    println!("Created category {} ({})", category.id, category.name);
    Ok(())
}

/// Rename a category or change its icon (admin)
pub async fn update_category(
    client: &StoreClient,
    id: u64,
    name: &str,
    icon: Option<&str>,
) -> Result<()> {
    let body = category_body(name, icon)?;
    let _: serde_json::Value = client.put(&format!("/categories/{}", id), &body).await?;
    println!("Updated category {}", id);
    Ok(())
}

/// Delete a category (admin)
pub async fn delete_category(client: &StoreClient, id: u64) -> Result<()> {
    let _: serde_json::Value = client.delete(&format!("/categories/{}", id)).await?;
    println!("Deleted category {}", id);
    Ok(())
}
