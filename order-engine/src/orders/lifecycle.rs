//! Order State Machine
//!
//! Every legal status change is one row of [`TRANSITIONS`]. Anything not in
//! the table is rejected with [`OrderError::InvalidTransition`].
//!
//! ```text
//!            Process            Ship            Deliver
//! pending ────────────► processing ──────► shipped ──────► delivered
//!    │                     │    │                              │
//!    │ Cancel       Cancel │    │ Refund                Refund │
//!    ▼                     ▼    ▼                              ▼
//! cancelled ◄──────────────┘  refunded ◄───────────────────────┘
//! ```
//!
//! A transition runs as one write transaction: guard check, side effects on
//! inventory and coupons, the status write and the history row either all
//! commit or none do.

use redb::WriteTransaction;
use shared::models::PaymentStatus;
use shared::order::{Order, OrderStatus, StatusEvent, StatusHistoryEntry};
use shared::util::now_millis;

use super::coupons::CouponTracker;
use super::error::{OrderError, OrderResult};
use super::inventory::InventoryEngine;
use super::payments::summarize;
use super::storage::LedgerStore;

/// Precondition a transition checks before it is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
    /// Completed payments cover the order total
    PaidInFull,
    /// At least one completed payment exists
    HasCompletedPayment,
}

/// Work performed in the same transaction as the status change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideEffect {
    CommitReservation,
    ReleaseReservation,
    ReverseCoupons,
}

/// One row of the transition table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: OrderStatus,
    pub event: StatusEvent,
    pub to: OrderStatus,
    pub guard: Option<Guard>,
    pub effects: &'static [SideEffect],
}

const UNWIND: &[SideEffect] = &[SideEffect::ReleaseReservation, SideEffect::ReverseCoupons];

pub const TRANSITIONS: &[Transition] = &[
    Transition {
        from: OrderStatus::Pending,
        event: StatusEvent::Process,
        to: OrderStatus::Processing,
        guard: Some(Guard::PaidInFull),
        effects: &[],
    },
    Transition {
        from: OrderStatus::Processing,
        event: StatusEvent::Ship,
        to: OrderStatus::Shipped,
        guard: None,
        effects: &[SideEffect::CommitReservation],
    },
    Transition {
        from: OrderStatus::Shipped,
        event: StatusEvent::Deliver,
        to: OrderStatus::Delivered,
        guard: None,
        effects: &[],
    },
    Transition {
        from: OrderStatus::Pending,
        event: StatusEvent::Cancel,
        to: OrderStatus::Cancelled,
        guard: None,
        effects: UNWIND,
    },
    Transition {
        from: OrderStatus::Processing,
        event: StatusEvent::Cancel,
        to: OrderStatus::Cancelled,
        guard: None,
        effects: UNWIND,
    },
    Transition {
        from: OrderStatus::Processing,
        event: StatusEvent::Refund,
        to: OrderStatus::Refunded,
        guard: Some(Guard::HasCompletedPayment),
        effects: UNWIND,
    },
    Transition {
        from: OrderStatus::Delivered,
        event: StatusEvent::Refund,
        to: OrderStatus::Refunded,
        guard: Some(Guard::HasCompletedPayment),
        effects: &[],
    },
];

/// Find the table row for `event` fired in status `from`.
pub fn lookup(from: OrderStatus, event: StatusEvent) -> Option<&'static Transition> {
    TRANSITIONS
        .iter()
        .find(|t| t.from == from && t.event == event)
}

/// Statuses reachable from `from` in one step
pub fn next_statuses(from: OrderStatus) -> Vec<OrderStatus> {
    TRANSITIONS
        .iter()
        .filter(|t| t.from == from)
        .map(|t| t.to)
        .collect()
}

/// Applies table transitions to stored orders
#[derive(Debug, Clone)]
pub struct StateMachine {
    storage: LedgerStore,
    inventory: InventoryEngine,
    coupons: CouponTracker,
}

impl StateMachine {
    pub fn new(storage: LedgerStore, inventory: InventoryEngine, coupons: CouponTracker) -> Self {
        Self {
            storage,
            inventory,
            coupons,
        }
    }

    /// Fire `event` on an order.
    pub fn apply(
        &self,
        order_id: &str,
        event: StatusEvent,
        actor: &str,
        note: Option<String>,
    ) -> OrderResult<StatusHistoryEntry> {
        let txn = self.storage.begin_write()?;
        let mut order = self
            .storage
            .get_order_txn(&txn, order_id)?
            .ok_or_else(|| OrderError::OrderNotFound(order_id.to_string()))?;

        let transition = lookup(order.status, event).ok_or(OrderError::InvalidTransition {
            from: order.status,
            to: event.target(),
        })?;

        if let Some(guard) = transition.guard {
            self.check_guard(&txn, &order, guard)?;
        }

        let now = now_millis();
        for effect in transition.effects {
            self.run_effect(&txn, order_id, *effect, now)?;
        }

        let previous_status = order.status;
        order.status = transition.to;
        order.updated_at = now;
        self.storage.store_order(&txn, &order)?;

        let entry = StatusHistoryEntry {
            order_id: order_id.to_string(),
            sequence: self.storage.increment_sequence(&txn)?,
            previous_status,
            new_status: transition.to,
            actor: actor.to_string(),
            note,
            timestamp: now,
        };
        self.storage.append_history(&txn, &entry)?;
        self.storage.commit(txn)?;

        tracing::info!(
            order_id = %order_id,
            from = %previous_status,
            to = %transition.to,
            actor = %actor,
            sequence = entry.sequence,
            "Order status changed"
        );
        Ok(entry)
    }

    /// Move an order to `target`, picking the event that leads there.
    pub fn transition_to(
        &self,
        order_id: &str,
        target: OrderStatus,
        actor: &str,
        note: Option<String>,
    ) -> OrderResult<StatusHistoryEntry> {
        match StatusEvent::targeting(target) {
            Some(event) => self.apply(order_id, event, actor, note),
            None => {
                let from = self
                    .storage
                    .get_order(order_id)?
                    .ok_or_else(|| OrderError::OrderNotFound(order_id.to_string()))?
                    .status;
                Err(OrderError::InvalidTransition { from, to: target })
            }
        }
    }

    fn check_guard(&self, txn: &WriteTransaction, order: &Order, guard: Guard) -> OrderResult<()> {
        let payments = self.storage.get_payments_for_order_txn(txn, &order.id)?;
        match guard {
            Guard::PaidInFull => {
                let summary = summarize(&payments, order.total);
                if summary.completed < order.total {
                    return Err(OrderError::PaymentRequired(format!(
                        "order {} has {} paid of {}",
                        order.id, summary.completed, order.total
                    )));
                }
            }
            Guard::HasCompletedPayment => {
                if !payments.iter().any(|p| p.status == PaymentStatus::Completed) {
                    return Err(OrderError::PaymentRequired(format!(
                        "order {} has no completed payment to refund",
                        order.id
                    )));
                }
            }
        }
        Ok(())
    }

    fn run_effect(
        &self,
        txn: &WriteTransaction,
        order_id: &str,
        effect: SideEffect,
        now: i64,
    ) -> OrderResult<()> {
        match effect {
            SideEffect::CommitReservation => {
                if !self.inventory.commit_in(txn, order_id, now)? {
                    return Err(OrderError::ConstraintViolation(format!(
                        "order {order_id} has no held reservation to commit"
                    )));
                }
            }
            SideEffect::ReleaseReservation => {
                self.inventory.release_in(txn, order_id, now)?;
            }
            SideEffect::ReverseCoupons => {
                self.coupons.reverse_in(txn, order_id)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use shared::models::{
        Coupon, CouponDiscount, InventoryRecord, Payment, PaymentMethod, Product, RedemptionState,
        ReservationState,
    };
    use shared::order::{LineItemDraft, OrderItem};
    use std::collections::HashSet;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_exact(s).unwrap()
    }

    struct Fixture {
        storage: LedgerStore,
        inventory: InventoryEngine,
        coupons: CouponTracker,
        machine: StateMachine,
    }

    fn setup() -> Fixture {
        let storage = LedgerStore::open_in_memory().unwrap();
        let inventory = InventoryEngine::new(storage.clone());
        let coupons = CouponTracker::new(storage.clone());
        let machine = StateMachine::new(storage.clone(), inventory.clone(), coupons.clone());

        let txn = storage.begin_write().unwrap();
        storage
            .store_product(&txn, &Product::new("p1", "SKU-1", "Widget", d("10.00")))
            .unwrap();
        storage
            .store_inventory(
                &txn,
                "p1",
                &InventoryRecord {
                    quantity: 10,
                    reserved: 0,
                    last_restocked: None,
                },
            )
            .unwrap();
        let mut order = Order {
            id: "ord_1".to_string(),
            customer_id: "c1".to_string(),
            billing_address_id: "a1".to_string(),
            shipping_address_id: "a1".to_string(),
            status: OrderStatus::Pending,
            items: vec![OrderItem {
                product_id: "p1".to_string(),
                name: "Widget".to_string(),
                quantity: 3,
                unit_price: d("10.00"),
                line_total: d("30.00"),
            }],
            subtotal: d("30.00"),
            shipping_cost: Decimal::ZERO,
            discount_amount: Decimal::ZERO,
            total: Decimal::ZERO,
            created_at: 0,
            updated_at: 0,
        };
        order.recalculate_total();
        storage.store_order(&txn, &order).unwrap();
        storage.commit(txn).unwrap();

        inventory
            .reserve("ord_1", &[LineItemDraft::new("p1", 3)])
            .unwrap();

        Fixture {
            storage,
            inventory,
            coupons,
            machine,
        }
    }

    fn pay(storage: &LedgerStore, amount: &str, status: PaymentStatus, reference: &str) {
        let txn = storage.begin_write().unwrap();
        let payment = Payment {
            id: format!("pay_{reference}"),
            order_id: "ord_1".to_string(),
            reference: reference.to_string(),
            amount: d(amount),
            method: PaymentMethod::Card,
            status,
            refund_of: None,
            created_at: 0,
            settled_at: None,
        };
        assert!(storage.insert_payment(&txn, &payment).unwrap());
        storage.commit(txn).unwrap();
    }

    #[test]
    fn test_table_is_deterministic() {
        let mut seen = HashSet::new();
        for t in TRANSITIONS {
            assert!(seen.insert((t.from, t.event)), "duplicate row {:?}", t);
            assert_eq!(t.event.target(), t.to);
        }
        assert!(next_statuses(OrderStatus::Cancelled).is_empty());
        assert!(next_statuses(OrderStatus::Refunded).is_empty());
    }

    #[test]
    fn test_pending_to_delivered_rejected() {
        let f = setup();
        let err = f
            .machine
            .transition_to("ord_1", OrderStatus::Delivered, "tester", None)
            .unwrap_err();
        assert!(matches!(
            err,
            OrderError::InvalidTransition {
                from: OrderStatus::Pending,
                to: OrderStatus::Delivered
            }
        ));
        assert!(f.storage.get_history_for_order("ord_1").unwrap().is_empty());
    }

    #[test]
    fn test_process_requires_full_payment() {
        let f = setup();
        pay(&f.storage, "20.00", PaymentStatus::Completed, "r1");
        pay(&f.storage, "10.00", PaymentStatus::Pending, "r2");

        let err = f
            .machine
            .apply("ord_1", StatusEvent::Process, "tester", None)
            .unwrap_err();
        assert!(matches!(err, OrderError::PaymentRequired(_)));
        assert_eq!(
            f.storage.get_order("ord_1").unwrap().unwrap().status,
            OrderStatus::Pending
        );
    }

    #[test]
    fn test_full_path_writes_history_in_order() {
        let f = setup();
        pay(&f.storage, "30.00", PaymentStatus::Completed, "r1");

        for target in [
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
        ] {
            f.machine
                .transition_to("ord_1", target, "tester", None)
                .unwrap();
        }

        let history = f.storage.get_history_for_order("ord_1").unwrap();
        assert_eq!(history.len(), 3);
        let pairs: Vec<_> = history
            .iter()
            .map(|h| (h.previous_status, h.new_status))
            .collect();
        assert_eq!(
            pairs,
            vec![
                (OrderStatus::Pending, OrderStatus::Processing),
                (OrderStatus::Processing, OrderStatus::Shipped),
                (OrderStatus::Shipped, OrderStatus::Delivered),
            ]
        );
        assert!(history.windows(2).all(|w| w[0].sequence < w[1].sequence));

        // shipping committed the reservation
        let record = f.inventory.get("p1").unwrap();
        assert_eq!(record.quantity, 7);
        assert_eq!(record.reserved, 0);
        assert_eq!(
            f.storage.get_reservation("ord_1").unwrap().unwrap().state,
            ReservationState::Committed
        );
    }

    #[test]
    fn test_cancel_releases_stock_and_coupons() {
        let f = setup();
        f.coupons
            .upsert(Coupon::new("SAVE5", CouponDiscount::Fixed(d("5"))))
            .unwrap();
        f.coupons.redeem("SAVE5", "ord_1").unwrap();
        assert_eq!(f.inventory.availability("p1").unwrap(), 7);

        let entry = f
            .machine
            .apply("ord_1", StatusEvent::Cancel, "tester", Some("customer request".into()))
            .unwrap();
        assert_eq!(entry.new_status, OrderStatus::Cancelled);
        assert_eq!(entry.note.as_deref(), Some("customer request"));

        assert_eq!(f.inventory.availability("p1").unwrap(), 10);
        assert_eq!(f.coupons.get("SAVE5").unwrap().times_used, 0);
        assert_eq!(
            f.coupons.redemptions("ord_1").unwrap()[0].state,
            RedemptionState::Reversed
        );

        // closed orders stay closed
        let err = f
            .machine
            .apply("ord_1", StatusEvent::Cancel, "tester", None)
            .unwrap_err();
        assert!(matches!(err, OrderError::InvalidTransition { .. }));
    }

    #[test]
    fn test_refund_requires_completed_payment() {
        let f = setup();
        pay(&f.storage, "30.00", PaymentStatus::Completed, "r1");
        f.machine
            .apply("ord_1", StatusEvent::Process, "tester", None)
            .unwrap();
        f.machine
            .apply("ord_1", StatusEvent::Refund, "tester", None)
            .unwrap();
        assert_eq!(f.inventory.availability("p1").unwrap(), 10);

        let g = setup();
        let err = g
            .machine
            .transition_to("ord_1", OrderStatus::Refunded, "tester", None)
            .unwrap_err();
        assert!(matches!(err, OrderError::InvalidTransition { .. }));
    }

    #[test]
    fn test_pending_target_is_never_reachable() {
        let f = setup();
        let err = f
            .machine
            .transition_to("ord_1", OrderStatus::Pending, "tester", None)
            .unwrap_err();
        assert!(matches!(
            err,
            OrderError::InvalidTransition {
                from: OrderStatus::Pending,
                to: OrderStatus::Pending
            }
        ));
        assert!(matches!(
            f.machine.apply("missing", StatusEvent::Ship, "tester", None),
            Err(OrderError::OrderNotFound(_))
        ));
    }
}
