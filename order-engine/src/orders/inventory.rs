//! Inventory Reservation Engine
//!
//! The only code that mutates `InventoryRecord::reserved`.
//!
//! ```text
//! reserve ──► Held ──► release ──► Released
//!               │
//!               └────► commit ───► Committed   (quantity and reserved both drop)
//! ```
//!
//! Each operation has a `*_in` form that joins a caller's write transaction,
//! so order placement and status transitions can reserve, release or commit in
//! the same atomic unit as their own writes.

use redb::WriteTransaction;
use shared::models::{InventoryRecord, Reservation, ReservationLine, ReservationState};
use shared::money::MAX_QUANTITY;
use shared::order::LineItemDraft;
use shared::util::now_millis;

use super::error::{OrderError, OrderResult};
use super::storage::LedgerStore;

/// Stock reservation, release and commit
#[derive(Debug, Clone)]
pub struct InventoryEngine {
    storage: LedgerStore,
}

impl InventoryEngine {
    pub fn new(storage: LedgerStore) -> Self {
        Self { storage }
    }

    /// Inventory row for a product; a missing row reads as zero stock.
    pub fn get(&self, product_id: &str) -> OrderResult<InventoryRecord> {
        Ok(self.storage.get_inventory(product_id)?.unwrap_or_default())
    }

    /// `quantity - reserved`
    pub fn availability(&self, product_id: &str) -> OrderResult<u32> {
        Ok(self.get(product_id)?.available())
    }

    /// Reserve stock for every line of an order, all-or-nothing.
    pub fn reserve(&self, order_id: &str, lines: &[LineItemDraft]) -> OrderResult<Reservation> {
        let txn = self.storage.begin_write()?;
        let reservation = self.reserve_in(&txn, order_id, lines, now_millis())?;
        self.storage.commit(txn)?;
        Ok(reservation)
    }

    /// Reserve inside an open write transaction.
    ///
    /// Every line is checked before anything is written; the first line whose
    /// product cannot cover the request fails the whole reservation with
    /// [`OrderError::InsufficientStock`].
    pub(crate) fn reserve_in(
        &self,
        txn: &WriteTransaction,
        order_id: &str,
        lines: &[LineItemDraft],
        now: i64,
    ) -> OrderResult<Reservation> {
        if lines.is_empty() {
            return Err(OrderError::constraint("reservation needs at least one line"));
        }
        if self.storage.get_reservation_txn(txn, order_id)?.is_some() {
            return Err(OrderError::constraint(format!(
                "order {} already holds a reservation",
                order_id
            )));
        }

        let mut merged: Vec<ReservationLine> = Vec::with_capacity(lines.len());
        for line in lines {
            if line.quantity == 0 || line.quantity > MAX_QUANTITY {
                return Err(OrderError::constraint(format!(
                    "quantity for product {} must be between 1 and {}, got {}",
                    line.product_id, MAX_QUANTITY, line.quantity
                )));
            }
            match merged.iter_mut().find(|l| l.product_id == line.product_id) {
                Some(existing) => {
                    existing.quantity = existing.quantity.saturating_add(line.quantity)
                }
                None => merged.push(ReservationLine {
                    product_id: line.product_id.clone(),
                    quantity: line.quantity,
                }),
            }
        }

        // Phase 1: check every line against a consistent view
        let mut updated: Vec<(&str, InventoryRecord)> = Vec::with_capacity(merged.len());
        for line in &merged {
            let record = self
                .storage
                .get_inventory_txn(txn, &line.product_id)?
                .unwrap_or_default();
            let available = record.available();
            if available < line.quantity {
                tracing::debug!(
                    order_id = %order_id,
                    product_id = %line.product_id,
                    requested = line.quantity,
                    available,
                    "Reservation rejected"
                );
                return Err(OrderError::InsufficientStock {
                    product_id: line.product_id.clone(),
                    requested: line.quantity,
                    available,
                });
            }
            let mut next = record;
            next.reserved += line.quantity;
            updated.push((line.product_id.as_str(), next));
        }

        // Phase 2: apply
        for (product_id, record) in &updated {
            self.storage.store_inventory(txn, product_id, record)?;
        }

        let reservation = Reservation {
            order_id: order_id.to_string(),
            lines: merged,
            state: ReservationState::Held,
            created_at: now,
            updated_at: now,
        };
        self.storage.store_reservation(txn, &reservation)?;

        tracing::debug!(order_id = %order_id, lines = reservation.lines.len(), "Stock reserved");
        Ok(reservation)
    }

    /// Return an order's reserved stock. Returns `false` when there was
    /// nothing to release (already released, committed, or never reserved).
    ///
    /// Orders still pending or processing are refused: their stock only moves
    /// through status transitions.
    pub fn release(&self, order_id: &str) -> OrderResult<bool> {
        let txn = self.storage.begin_write()?;
        self.ensure_not_open(&txn, order_id)?;
        let released = self.release_in(&txn, order_id, now_millis())?;
        self.storage.commit(txn)?;
        Ok(released)
    }

    fn ensure_not_open(&self, txn: &WriteTransaction, order_id: &str) -> OrderResult<()> {
        if let Some(order) = self.storage.get_order_txn(txn, order_id)?
            && order.status.is_open()
        {
            return Err(OrderError::ConstraintViolation(format!(
                "order {order_id} is {}; its stock moves with status transitions",
                order.status
            )));
        }
        Ok(())
    }

    pub(crate) fn release_in(
        &self,
        txn: &WriteTransaction,
        order_id: &str,
        now: i64,
    ) -> OrderResult<bool> {
        let Some(mut reservation) = self.storage.get_reservation_txn(txn, order_id)? else {
            return Ok(false);
        };
        if !reservation.is_held() {
            tracing::debug!(order_id = %order_id, state = ?reservation.state, "Release is a no-op");
            return Ok(false);
        }

        for line in &reservation.lines {
            let mut record = self
                .storage
                .get_inventory_txn(txn, &line.product_id)?
                .unwrap_or_default();
            record.reserved = record.reserved.saturating_sub(line.quantity);
            self.storage.store_inventory(txn, &line.product_id, &record)?;
        }

        reservation.state = ReservationState::Released;
        reservation.updated_at = now;
        self.storage.store_reservation(txn, &reservation)?;

        tracing::debug!(order_id = %order_id, "Reservation released");
        Ok(true)
    }

    /// Fulfil an order's reservation: stock leaves the warehouse.
    /// Returns `false` when the reservation is not held.
    pub fn commit(&self, order_id: &str) -> OrderResult<bool> {
        let txn = self.storage.begin_write()?;
        self.ensure_not_open(&txn, order_id)?;
        let committed = self.commit_in(&txn, order_id, now_millis())?;
        self.storage.commit(txn)?;
        Ok(committed)
    }

    pub(crate) fn commit_in(
        &self,
        txn: &WriteTransaction,
        order_id: &str,
        now: i64,
    ) -> OrderResult<bool> {
        let Some(mut reservation) = self.storage.get_reservation_txn(txn, order_id)? else {
            return Ok(false);
        };
        if !reservation.is_held() {
            tracing::debug!(order_id = %order_id, state = ?reservation.state, "Commit is a no-op");
            return Ok(false);
        }

        for line in &reservation.lines {
            let mut record = self
                .storage
                .get_inventory_txn(txn, &line.product_id)?
                .unwrap_or_default();
            record.quantity = record.quantity.checked_sub(line.quantity).ok_or_else(|| {
                OrderError::constraint(format!(
                    "product {} has {} on hand, cannot ship {}",
                    line.product_id, record.quantity, line.quantity
                ))
            })?;
            record.reserved = record.reserved.saturating_sub(line.quantity);
            if !record.is_consistent() {
                return Err(OrderError::constraint(format!(
                    "product {} would have reserved {} > quantity {}",
                    line.product_id, record.reserved, record.quantity
                )));
            }
            self.storage.store_inventory(txn, &line.product_id, &record)?;
        }

        reservation.state = ReservationState::Committed;
        reservation.updated_at = now;
        self.storage.store_reservation(txn, &reservation)?;

        tracing::debug!(order_id = %order_id, "Reservation committed");
        Ok(true)
    }

    /// Add received stock. Creates the inventory row if missing and stamps
    /// `last_restocked`.
    pub fn restock(&self, product_id: &str, amount: u32) -> OrderResult<InventoryRecord> {
        if amount == 0 {
            return Err(OrderError::constraint("restock amount must be positive"));
        }

        let txn = self.storage.begin_write()?;
        if self.storage.get_product_txn(&txn, product_id)?.is_none() {
            return Err(OrderError::ProductNotFound(product_id.to_string()));
        }

        let mut record = self
            .storage
            .get_inventory_txn(&txn, product_id)?
            .unwrap_or_default();
        record.quantity = record.quantity.checked_add(amount).ok_or_else(|| {
            OrderError::constraint(format!(
                "restock of {} overflows product {}",
                amount, product_id
            ))
        })?;
        record.last_restocked = Some(now_millis());
        self.storage.store_inventory(&txn, product_id, &record)?;
        self.storage.commit(txn)?;

        tracing::info!(
            product_id = %product_id,
            amount,
            quantity = record.quantity,
            "Product restocked"
        );
        Ok(record)
    }

    /// Correct the on-hand count after a stock take. Cannot drop below the
    /// units currently reserved.
    pub fn set_quantity(&self, product_id: &str, quantity: u32) -> OrderResult<InventoryRecord> {
        let txn = self.storage.begin_write()?;
        if self.storage.get_product_txn(&txn, product_id)?.is_none() {
            return Err(OrderError::ProductNotFound(product_id.to_string()));
        }

        let mut record = self
            .storage
            .get_inventory_txn(&txn, product_id)?
            .unwrap_or_default();
        if quantity < record.reserved {
            return Err(OrderError::constraint(format!(
                "product {} has {} reserved, cannot set quantity to {}",
                product_id, record.reserved, quantity
            )));
        }
        record.quantity = quantity;
        self.storage.store_inventory(&txn, product_id, &record)?;
        self.storage.commit(txn)?;

        tracing::info!(product_id = %product_id, quantity, "Stock count corrected");
        Ok(record)
    }
}
