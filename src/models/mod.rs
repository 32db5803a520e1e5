//! Data models for storefront entities

mod category;
mod order;
mod product;

pub use category::*;
pub use order::*;
pub use product::*;
