//! Order snapshot - the persisted state of one order

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::money::{MONEY_TOLERANCE, order_total, round_money};

/// Order status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::Pending,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
        OrderStatus::Refunded,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Refunded => "refunded",
        }
    }

    /// Orders that still hold (or may hold) a stock reservation
    pub fn is_open(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Processing)
    }

    /// Cancelled or refunded: nothing more can happen to the order
    pub fn is_closed(&self) -> bool {
        matches!(self, OrderStatus::Cancelled | OrderStatus::Refunded)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Line item with its price snapshot
///
/// Identity is `(order_id, product_id)`. Never modified after placement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderItem {
    pub product_id: String,
    /// Product name at placement time
    pub name: String,
    pub quantity: u32,
    /// Product price at placement time
    pub unit_price: Decimal,
    /// `unit_price * quantity`
    pub line_total: Decimal,
}

/// Persisted order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub id: String,
    pub customer_id: String,
    pub billing_address_id: String,
    pub shipping_address_id: String,
    pub status: OrderStatus,
    pub items: Vec<OrderItem>,
    pub subtotal: Decimal,
    pub shipping_cost: Decimal,
    pub discount_amount: Decimal,
    pub total: Decimal,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Order {
    /// Sum of line totals
    pub fn items_subtotal(&self) -> Decimal {
        round_money(self.items.iter().map(|i| i.line_total).sum())
    }

    /// Recompute `total` from its parts
    pub fn recalculate_total(&mut self) {
        self.total = order_total(self.subtotal, self.shipping_cost, self.discount_amount);
    }

    /// Largest discount that keeps `total >= 0`
    pub fn max_discount(&self) -> Decimal {
        round_money(self.subtotal + self.shipping_cost).max(Decimal::ZERO)
    }

    /// Check the money invariants, returning a description of the first breach.
    ///
    /// - `subtotal` equals the sum of line totals
    /// - `total == subtotal + shipping_cost - discount_amount`
    /// - `total >= 0`, `shipping_cost >= 0`, `discount_amount >= 0`
    pub fn check_totals(&self) -> Result<(), String> {
        if (self.items_subtotal() - self.subtotal).abs() >= MONEY_TOLERANCE {
            return Err(format!(
                "subtotal {} does not match line totals {}",
                self.subtotal,
                self.items_subtotal()
            ));
        }
        if self.shipping_cost < Decimal::ZERO {
            return Err(format!("shipping_cost must be non-negative, got {}", self.shipping_cost));
        }
        if self.discount_amount < Decimal::ZERO {
            return Err(format!(
                "discount_amount must be non-negative, got {}",
                self.discount_amount
            ));
        }
        let expected = order_total(self.subtotal, self.shipping_cost, self.discount_amount);
        if self.total != expected {
            return Err(format!("total {} != expected {}", self.total, expected));
        }
        if self.total < Decimal::ZERO {
            return Err(format!("total must be non-negative, got {}", self.total));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_exact(s).unwrap()
    }

    fn order_with(subtotal: &str, shipping: &str, discount: &str) -> Order {
        let mut order = Order {
            id: "ord_1".to_string(),
            customer_id: "c1".to_string(),
            billing_address_id: "a1".to_string(),
            shipping_address_id: "a1".to_string(),
            status: OrderStatus::Pending,
            items: vec![OrderItem {
                product_id: "p1".to_string(),
                name: "Widget".to_string(),
                quantity: 1,
                unit_price: d(subtotal),
                line_total: d(subtotal),
            }],
            subtotal: d(subtotal),
            shipping_cost: d(shipping),
            discount_amount: d(discount),
            total: Decimal::ZERO,
            created_at: 0,
            updated_at: 0,
        };
        order.recalculate_total();
        order
    }

    #[test]
    fn test_total_formula() {
        let order = order_with("100.00", "5.00", "10.00");
        assert_eq!(order.total, d("95.00"));
        assert!(order.check_totals().is_ok());
    }

    #[test]
    fn test_negative_total_rejected() {
        let order = order_with("10.00", "0.00", "20.00");
        assert!(order.check_totals().is_err());
        assert_eq!(order.max_discount(), d("10.00"));
    }

    #[test]
    fn test_tampered_total_detected() {
        let mut order = order_with("100.00", "5.00", "10.00");
        order.total = d("96.00");
        assert!(order.check_totals().is_err());
    }

    #[test]
    fn test_status_wire_names() {
        for status in OrderStatus::ALL {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
        assert!(OrderStatus::Processing.is_open());
        assert!(OrderStatus::Refunded.is_closed());
    }
}
