//! Orders, cart lines and sales totals

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::Product;

/// Line of a placed order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: u64,
    pub name: String,
    pub price: f64,
    pub qty: u32,
    #[serde(default)]
    pub image: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: u64,
    pub items: Vec<OrderItem>,
    pub total: f64,
    /// ISO-8601 timestamp set by the backend
    pub date: String,
    pub status: String,
}

/// Line of a cart as the place-order endpoint expects it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CartItem {
    pub id: u64,
    pub name: String,
    pub price: f64,
    pub qty: u32,
    pub image: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    /// Add `qty` of a product, merging with an existing line.
    ///
    /// Returns the line's new quantity, or `None` with the cart unchanged
    /// when the quantity would overflow.
    pub fn add(&mut self, product: &Product, qty: u32) -> Option<u32> {
        match self.items.iter_mut().find(|i| i.id == product.id) {
            Some(line) => {
                line.qty = line.qty.checked_add(qty)?;
                Some(line.qty)
            }
            None if qty == 0 => Some(0),
            None => {
                self.items.push(CartItem {
                    id: product.id,
                    name: product.name.clone(),
                    price: product.price,
                    qty,
                    image: product.image.clone(),
                });
                Some(qty)
            }
        }
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn count(&self) -> u64 {
        self.items.iter().map(|i| u64::from(i.qty)).sum()
    }

    pub fn total(&self) -> f64 {
        self.items.iter().map(|i| i.price * f64::from(i.qty)).sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductSales {
    pub name: String,
    pub qty: u64,
    pub revenue: f64,
}

/// Totals over a list of orders
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SalesStats {
    pub total_orders: usize,
    pub total_revenue: f64,
    pub total_items_sold: u64,
    pub product_sales: BTreeMap<u64, ProductSales>,
}

impl SalesStats {
    pub fn from_orders(orders: &[Order]) -> Self {
        let mut stats = Self {
            total_orders: orders.len(),
            ..Self::default()
        };

        for order in orders {
            stats.total_revenue += order.total;
            for item in &order.items {
                stats.total_items_sold += u64::from(item.qty);
                let entry = stats
                    .product_sales
                    .entry(item.product_id)
                    .or_insert_with(|| ProductSales {
                        name: item.name.clone(),
                        ..ProductSales::default()
                    });
                entry.qty += u64::from(item.qty);
                entry.revenue += item.price * f64::from(item.qty);
            }
        }

        stats
    }
}
