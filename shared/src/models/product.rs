//! Product Model

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Product entity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub id: String,
    /// Stock keeping unit, unique across the catalog
    pub sku: String,
    pub name: String,
    /// Current list price, never negative
    pub price: Decimal,
    /// Supplier reference (zero or one)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplier_id: Option<String>,
    /// Category references (many-to-many)
    #[serde(default)]
    pub category_ids: Vec<String>,
    pub is_active: bool,
}

impl Product {
    pub fn new(
        id: impl Into<String>,
        sku: impl Into<String>,
        name: impl Into<String>,
        price: Decimal,
    ) -> Self {
        Self {
            id: id.into(),
            sku: sku.into(),
            name: name.into(),
            price,
            supplier_id: None,
            category_ids: Vec::new(),
            is_active: true,
        }
    }
}
