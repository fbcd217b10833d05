//! Ledger consistency audit
//!
//! Re-derives every cross-row invariant from a read snapshot of the store:
//!
//! ```text
//! inventory     reserved <= quantity, reserved == Σ held reservation lines
//! orders        subtotal/total arithmetic, no held stock once closed or shipped
//! payments      refunded <= completed per order
//! coupons       times_used <= usage_limit, times_used == applied redemptions
//! ```
//!
//! Run at startup and from the stress tests. A clean ledger yields an empty
//! violation list.

pub mod types;

pub use types::{AuditReport, Violation};

use shared::models::RedemptionState;
use std::collections::HashMap;

use crate::orders::payments::summarize;
use crate::orders::{LedgerStore, OrderResult};

/// Check the whole ledger.
pub fn audit_ledger(storage: &LedgerStore) -> OrderResult<AuditReport> {
    let mut report = AuditReport::default();

    let orders = storage.get_all_orders()?;
    let status_by_order: HashMap<&str, _> =
        orders.iter().map(|o| (o.id.as_str(), o.status)).collect();

    // Inventory against held reservations
    let mut held: HashMap<String, u32> = HashMap::new();
    for reservation in storage.get_all_reservations()? {
        if !reservation.is_held() {
            continue;
        }
        if let Some(status) = status_by_order.get(reservation.order_id.as_str())
            && !status.is_open()
        {
            report.violations.push(Violation::StrayReservation {
                order_id: reservation.order_id.clone(),
                status: status.to_string(),
            });
        }
        for line in &reservation.lines {
            *held.entry(line.product_id.clone()).or_default() += line.quantity;
        }
    }

    let inventory = storage.get_all_inventory()?;
    report.inventory_rows = inventory.len();
    for (product_id, record) in inventory {
        if !record.is_consistent() {
            report.violations.push(Violation::OverReserved {
                product_id: product_id.clone(),
                quantity: record.quantity,
                reserved: record.reserved,
            });
        }
        let held_units = held.remove(&product_id).unwrap_or(0);
        if held_units != record.reserved {
            report.violations.push(Violation::ReservedMismatch {
                product_id,
                recorded: record.reserved,
                held: held_units,
            });
        }
    }
    // Held lines for products with no inventory row
    for (product_id, held_units) in held {
        report.violations.push(Violation::ReservedMismatch {
            product_id,
            recorded: 0,
            held: held_units,
        });
    }

    report.orders = orders.len();
    for order in &orders {
        if let Err(detail) = order.check_totals() {
            report.violations.push(Violation::OrderTotals {
                order_id: order.id.clone(),
                detail,
            });
        }
        let payments = storage.get_payments_for_order(&order.id)?;
        let summary = summarize(&payments, order.total);
        if summary.refunded > summary.completed {
            report.violations.push(Violation::OverRefunded {
                order_id: order.id.clone(),
                completed: summary.completed.to_string(),
                refunded: summary.refunded.to_string(),
            });
        }
    }

    let mut applied: HashMap<String, u32> = HashMap::new();
    for redemption in storage.get_all_redemptions()? {
        if redemption.state == RedemptionState::Applied {
            *applied.entry(redemption.code).or_default() += 1;
        }
    }

    let coupons = storage.get_all_coupons()?;
    report.coupons = coupons.len();
    for coupon in coupons {
        if let Some(limit) = coupon.usage_limit
            && coupon.times_used > limit
        {
            report.violations.push(Violation::CouponOverUsed {
                code: coupon.code.clone(),
                times_used: coupon.times_used,
                usage_limit: limit,
            });
        }
        let applied_count = applied.get(&coupon.code).copied().unwrap_or(0);
        if applied_count != coupon.times_used {
            report.violations.push(Violation::CouponUsageMismatch {
                code: coupon.code,
                times_used: coupon.times_used,
                applied: applied_count,
            });
        }
    }

    if report.is_consistent() {
        tracing::debug!(
            inventory_rows = report.inventory_rows,
            orders = report.orders,
            coupons = report.coupons,
            "Ledger audit clean"
        );
    } else {
        for violation in &report.violations {
            tracing::error!(%violation, "Ledger invariant violated");
        }
    }
    Ok(report)
}
