//! OrdersManager - entry point for order placement and lifecycle commands
//!
//! Owns the ledger store and the four engines built on it, and broadcasts
//! every committed status change.
//!
//! # Placement Flow
//!
//! ```text
//! place_order(draft)
//!     ├─ 1. Validate draft (lines, shipping, manual discount)
//!     ├─ 2. Begin write transaction
//!     ├─ 3. Check customer and address ownership
//!     ├─ 4. Snapshot product names and prices into line items
//!     ├─ 5. Reserve stock for every line (all-or-nothing)
//!     ├─ 6. Redeem coupons against the pending order
//!     ├─ 7. Check totals, persist order
//!     ├─ 8. Commit transaction
//!     └─ 9. Return order
//! ```
//!
//! Any failure before step 8 drops the transaction, so no reservation or
//! redemption outlives a rejected placement.

use rust_decimal::Decimal;
use shared::money::{MAX_PRICE, line_total, round_money};
use shared::order::{
    Order, OrderDraft, OrderItem, OrderStatus, StatusEvent, StatusHistoryEntry,
};
use shared::util::{now_millis, prefixed_id};
use std::path::Path;
use std::time::Duration;
use tokio::sync::broadcast;

use super::catalog::Catalog;
use super::coupons::CouponTracker;
use super::error::{OrderError, OrderResult};
use super::inventory::InventoryEngine;
use super::lifecycle::StateMachine;
use super::payments::PaymentReconciler;
use super::storage::LedgerStore;

/// Status change broadcast capacity
const EVENT_CHANNEL_CAPACITY: usize = 4096;

pub struct OrdersManager {
    storage: LedgerStore,
    inventory: InventoryEngine,
    coupons: CouponTracker,
    payments: PaymentReconciler,
    lifecycle: StateMachine,
    catalog: Catalog,
    event_tx: broadcast::Sender<StatusHistoryEntry>,
}

impl std::fmt::Debug for OrdersManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrdersManager")
            .field("storage", &self.storage)
            .field("event_tx", &"<broadcast::Sender>")
            .finish()
    }
}

impl OrdersManager {
    /// Open (or create) the ledger at `db_path`
    pub fn new(db_path: impl AsRef<Path>) -> OrderResult<Self> {
        let storage = LedgerStore::open(db_path)?;
        tracing::info!("OrdersManager started");
        Ok(Self::with_storage(storage))
    }

    /// Create an OrdersManager over existing storage
    pub fn with_storage(storage: LedgerStore) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let inventory = InventoryEngine::new(storage.clone());
        let coupons = CouponTracker::new(storage.clone());
        let lifecycle = StateMachine::new(storage.clone(), inventory.clone(), coupons.clone());
        Self {
            payments: PaymentReconciler::new(storage.clone()),
            catalog: Catalog::new(storage.clone()),
            storage,
            inventory,
            coupons,
            lifecycle,
            event_tx,
        }
    }

    /// Bound gateway confirmations by `timeout`
    pub fn with_gateway_timeout(mut self, timeout: Duration) -> Self {
        self.payments = self.payments.with_gateway_timeout(timeout);
        self
    }

    /// Receive every committed status change
    pub fn subscribe(&self) -> broadcast::Receiver<StatusHistoryEntry> {
        self.event_tx.subscribe()
    }

    pub fn storage(&self) -> &LedgerStore {
        &self.storage
    }

    pub fn inventory(&self) -> &InventoryEngine {
        &self.inventory
    }

    pub fn coupons(&self) -> &CouponTracker {
        &self.coupons
    }

    pub fn payments(&self) -> &PaymentReconciler {
        &self.payments
    }

    pub fn lifecycle(&self) -> &StateMachine {
        &self.lifecycle
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    // ========== Placement ==========

    /// Place an order: snapshot prices, reserve stock and redeem coupons
    /// atomically. The order starts `pending`.
    pub fn place_order(&self, draft: OrderDraft) -> OrderResult<Order> {
        let lines = draft.merged_lines();
        if lines.is_empty() {
            return Err(OrderError::constraint("order must have at least one item"));
        }
        if draft.shipping_cost < Decimal::ZERO {
            return Err(OrderError::constraint(format!(
                "shipping_cost must be non-negative, got {}",
                draft.shipping_cost
            )));
        }
        if draft.shipping_cost > MAX_PRICE {
            return Err(OrderError::constraint(format!(
                "shipping_cost exceeds maximum allowed ({}), got {}",
                MAX_PRICE, draft.shipping_cost
            )));
        }
        if draft.discount_amount < Decimal::ZERO {
            return Err(OrderError::constraint(format!(
                "discount_amount must be non-negative, got {}",
                draft.discount_amount
            )));
        }

        let now = now_millis();
        let order_id = prefixed_id("ord");

        let txn = self.storage.begin_write()?;
        if self
            .storage
            .get_customer_txn(&txn, &draft.customer_id)?
            .is_none()
        {
            return Err(OrderError::CustomerNotFound(draft.customer_id.clone()));
        }
        for address_id in [&draft.billing_address_id, &draft.shipping_address_id] {
            let address = self
                .storage
                .get_address_txn(&txn, address_id)?
                .ok_or_else(|| {
                    OrderError::constraint(format!("address {} does not exist", address_id))
                })?;
            if address.customer_id != draft.customer_id {
                return Err(OrderError::constraint(format!(
                    "address {} does not belong to customer {}",
                    address_id, draft.customer_id
                )));
            }
        }

        let mut items = Vec::with_capacity(lines.len());
        for line in &lines {
            let product = self
                .storage
                .get_product_txn(&txn, &line.product_id)?
                .ok_or_else(|| OrderError::ProductNotFound(line.product_id.clone()))?;
            if !product.is_active {
                return Err(OrderError::constraint(format!(
                    "product {} is not available for sale",
                    product.id
                )));
            }
            items.push(OrderItem {
                line_total: line_total(product.price, line.quantity),
                product_id: product.id,
                name: product.name,
                quantity: line.quantity,
                unit_price: product.price,
            });
        }

        let subtotal = round_money(items.iter().map(|i| i.line_total).sum());
        let mut order = Order {
            id: order_id.clone(),
            customer_id: draft.customer_id.clone(),
            billing_address_id: draft.billing_address_id.clone(),
            shipping_address_id: draft.shipping_address_id.clone(),
            status: OrderStatus::Pending,
            items,
            subtotal,
            shipping_cost: round_money(draft.shipping_cost),
            discount_amount: round_money(draft.discount_amount),
            total: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        };
        if order.discount_amount > order.max_discount() {
            return Err(OrderError::constraint(format!(
                "discount {} exceeds order value {}",
                order.discount_amount,
                order.max_discount()
            )));
        }
        order.recalculate_total();

        self.inventory.reserve_in(&txn, &order_id, &lines, now)?;
        for code in &draft.coupon_codes {
            self.coupons.redeem_in(&txn, code, &mut order, now)?;
        }

        order.check_totals().map_err(OrderError::ConstraintViolation)?;
        self.storage.store_order(&txn, &order)?;
        self.storage.commit(txn)?;

        tracing::info!(
            order_id = %order.id,
            customer_id = %order.customer_id,
            items = order.items.len(),
            subtotal = %order.subtotal,
            total = %order.total,
            coupons = draft.coupon_codes.len(),
            "Order placed"
        );
        Ok(order)
    }

    // ========== Queries ==========

    pub fn get_order(&self, order_id: &str) -> OrderResult<Order> {
        self.storage
            .get_order(order_id)?
            .ok_or_else(|| OrderError::OrderNotFound(order_id.to_string()))
    }

    /// Status history of an order, oldest first
    pub fn history(&self, order_id: &str) -> OrderResult<Vec<StatusHistoryEntry>> {
        Ok(self.storage.get_history_for_order(order_id)?)
    }

    // ========== Lifecycle ==========

    /// Move an order to `target` and broadcast the change.
    pub fn transition(
        &self,
        order_id: &str,
        target: OrderStatus,
        actor: &str,
        note: Option<String>,
    ) -> OrderResult<StatusHistoryEntry> {
        let entry = self.lifecycle.transition_to(order_id, target, actor, note)?;
        self.broadcast(&entry);
        Ok(entry)
    }

    /// Fire a lifecycle event and broadcast the change.
    pub fn apply_event(
        &self,
        order_id: &str,
        event: StatusEvent,
        actor: &str,
        note: Option<String>,
    ) -> OrderResult<StatusHistoryEntry> {
        let entry = self.lifecycle.apply(order_id, event, actor, note)?;
        self.broadcast(&entry);
        Ok(entry)
    }

    pub fn cancel_order(
        &self,
        order_id: &str,
        actor: &str,
        reason: Option<String>,
    ) -> OrderResult<StatusHistoryEntry> {
        self.apply_event(order_id, StatusEvent::Cancel, actor, reason)
    }

    fn broadcast(&self, entry: &StatusHistoryEntry) {
        // No receivers is fine
        if self.event_tx.send(entry.clone()).is_err() {
            tracing::trace!(order_id = %entry.order_id, "No status subscribers");
        }
    }
}

#[cfg(test)]
mod tests;
