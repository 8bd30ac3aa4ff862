//! Sample values and discriminators for integration tests

use cache_core::Discriminator;
use serde::{Deserialize, Serialize};

/// Region discriminators of a product catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Catalog {
    /// Product documents
    Products,
    /// Price lists
    Prices,
}

impl Discriminator for Catalog {}

/// Region discriminators of user sessions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sessions {
    /// Active sessions
    Active,
}

impl Discriminator for Sessions {}

/// Cached product document
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Product {
    /// Stock keeping unit
    pub sku: String,
    /// Display name
    pub name: String,
    /// Price in cents
    pub price_cents: u64,
}

/// Create a product with a name derived from its SKU
pub fn product(sku: &str, price_cents: u64) -> Product {
    Product {
        sku: sku.to_string(),
        name: format!("Product {sku}"),
        price_cents,
    }
}
