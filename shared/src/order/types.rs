//! Order placement input types

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One requested line
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LineItemDraft {
    pub product_id: String,
    pub quantity: u32,
}

impl LineItemDraft {
    pub fn new(product_id: impl Into<String>, quantity: u32) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
        }
    }
}

/// Order placement request
///
/// Prices are not part of the draft: unit prices are snapshotted from the
/// catalog when the order is placed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderDraft {
    pub customer_id: String,
    pub billing_address_id: String,
    pub shipping_address_id: String,
    pub items: Vec<LineItemDraft>,
    pub shipping_cost: Decimal,
    /// Manual discount on top of coupon discounts
    #[serde(default)]
    pub discount_amount: Decimal,
    /// Coupons redeemed together with the placement
    #[serde(default)]
    pub coupon_codes: Vec<String>,
}

impl OrderDraft {
    /// Collapse repeated products into one line each, keeping first-seen order.
    pub fn merged_lines(&self) -> Vec<LineItemDraft> {
        let mut lines: Vec<LineItemDraft> = Vec::with_capacity(self.items.len());
        for item in &self.items {
            match lines.iter_mut().find(|l| l.product_id == item.product_id) {
                Some(line) => line.quantity = line.quantity.saturating_add(item.quantity),
                None => lines.push(item.clone()),
            }
        }
        lines
    }
}
