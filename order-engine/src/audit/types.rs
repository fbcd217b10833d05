//! Audit report types

use serde::Serialize;
use std::fmt;

/// Result of a ledger consistency audit
#[derive(Debug, Default, Serialize)]
pub struct AuditReport {
    /// Inventory rows checked
    pub inventory_rows: usize,
    /// Orders checked (with their payments)
    pub orders: usize,
    /// Coupons checked
    pub coupons: usize,
    /// Broken invariants, empty when the ledger is consistent
    pub violations: Vec<Violation>,
}

impl AuditReport {
    pub fn is_consistent(&self) -> bool {
        self.violations.is_empty()
    }
}

/// One broken invariant
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    /// `reserved > quantity`
    OverReserved {
        product_id: String,
        quantity: u32,
        reserved: u32,
    },
    /// `reserved` disagrees with the sum of held reservations
    ReservedMismatch {
        product_id: String,
        recorded: u32,
        held: u32,
    },
    /// Order money fields do not add up
    OrderTotals { order_id: String, detail: String },
    /// Refund rows exceed captured payments
    OverRefunded {
        order_id: String,
        completed: String,
        refunded: String,
    },
    /// Held reservation on an order that can no longer ship
    StrayReservation { order_id: String, status: String },
    /// `times_used > usage_limit`
    CouponOverUsed {
        code: String,
        times_used: u32,
        usage_limit: u32,
    },
    /// `times_used` disagrees with the applied redemptions
    CouponUsageMismatch {
        code: String,
        times_used: u32,
        applied: u32,
    },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::OverReserved {
                product_id,
                quantity,
                reserved,
            } => write!(f, "product {product_id}: reserved {reserved} > quantity {quantity}"),
            Violation::ReservedMismatch {
                product_id,
                recorded,
                held,
            } => write!(
                f,
                "product {product_id}: reserved {recorded} but held reservations sum to {held}"
            ),
            Violation::OrderTotals { order_id, detail } => write!(f, "order {order_id}: {detail}"),
            Violation::OverRefunded {
                order_id,
                completed,
                refunded,
            } => write!(f, "order {order_id}: refunded {refunded} > captured {completed}"),
            Violation::StrayReservation { order_id, status } => {
                write!(f, "order {order_id} is {status} but still holds stock")
            }
            Violation::CouponOverUsed {
                code,
                times_used,
                usage_limit,
            } => write!(f, "coupon {code}: used {times_used} > limit {usage_limit}"),
            Violation::CouponUsageMismatch {
                code,
                times_used,
                applied,
            } => write!(
                f,
                "coupon {code}: times_used {times_used} but {applied} applied redemptions"
            ),
        }
    }
}
