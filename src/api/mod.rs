//! API client module for the Pixorus storefront

mod categories;
pub mod client;
mod orders;
mod products;
mod upload;

use std::path::Path;

use anyhow::Result;

pub use client::StoreClient;
pub use orders::parse_cart_line;

use crate::models::ProductFields;

/// List products, optionally only active ones
pub async fn list_products(client: &StoreClient, active_only: bool) -> Result<()> {
    products::list_products(client, active_only).await
}

/// Create a product
pub async fn add_product(client: &StoreClient, fields: &ProductFields) -> Result<()> {
    products::add_product(client, fields).await
}

/// Update fields of a product
pub async fn update_product(client: &StoreClient, id: u64, fields: &ProductFields) -> Result<()> {
    products::update_product(client, id, fields).await
}

/// Delete a product
pub async fn delete_product(client: &StoreClient, id: u64) -> Result<()> {
    products::delete_product(client, id).await
}

/// List categories
pub async fn list_categories(client: &StoreClient) -> Result<()> {
    categories::list_categories(client).await
}

/// Create a category
pub async fn add_category(client: &StoreClient, name: &str, icon: Option<&str>) -> Result<()> {
    categories::add_category(client, name, icon).await
}

/// Update a category
pub async fn update_category(
    client: &StoreClient,
    id: u64,
    name: &str,
    icon: Option<&str>,
) -> Result<()> {
    categories::update_category(client, id, name, icon).await
}

/// Delete a category
pub async fn delete_category(client: &StoreClient, id: u64) -> Result<()> {
    categories::delete_category(client, id).await
}

/// List orders
pub async fn list_orders(client: &StoreClient) -> Result<()> {
    orders::list_orders(client).await
}

/// Place an order from `<product id>:<qty>` lines
pub async fn place_order(client: &StoreClient, lines: &[(u64, u32)]) -> Result<()> {
    orders::place_order(client, lines).await
}

/// Show sales totals
pub async fn show_stats(client: &StoreClient) -> Result<()> {
    orders::show_stats(client).await
}

/// Upload a product image
pub async fn upload_image(client: &StoreClient, path: &Path, content_type: Option<&str>) -> Result<()> {
    upload::upload_image(client, path, content_type).await
}
