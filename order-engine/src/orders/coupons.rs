//! Coupon Redemption Tracker
//!
//! `times_used` is only touched here, always in the same write transaction as
//! the order-coupon association it accounts for. Write transactions are
//! serialized by the store, so two redemptions racing for the last use see
//! each other's increment and exactly one of them wins.

use redb::WriteTransaction;
use rust_decimal::Decimal;
use shared::models::{Coupon, CouponRedemption, RedemptionState};
use shared::money::round_money;
use shared::order::{Order, OrderStatus};
use shared::util::now_millis;

use super::error::{OrderError, OrderResult};
use super::storage::LedgerStore;

/// Coupon definitions and their redemption counters
#[derive(Debug, Clone)]
pub struct CouponTracker {
    storage: LedgerStore,
}

impl CouponTracker {
    pub fn new(storage: LedgerStore) -> Self {
        Self { storage }
    }

    /// Create or update a coupon definition.
    ///
    /// The stored `times_used` is authoritative and survives updates; a
    /// usage limit below it is rejected.
    pub fn upsert(&self, mut coupon: Coupon) -> OrderResult<Coupon> {
        if coupon.code.trim().is_empty() {
            return Err(OrderError::constraint("coupon code must not be empty"));
        }
        if !coupon.discount.is_valid() {
            return Err(OrderError::constraint(format!(
                "coupon {} has an invalid discount {:?}",
                coupon.code, coupon.discount
            )));
        }
        if coupon.min_order_amount.is_some_and(|min| min < Decimal::ZERO) {
            return Err(OrderError::constraint("min_order_amount must be non-negative"));
        }

        let txn = self.storage.begin_write()?;
        coupon.times_used = self
            .storage
            .get_coupon_txn(&txn, &coupon.code)?
            .map(|existing| existing.times_used)
            .unwrap_or(0);
        if let Some(limit) = coupon.usage_limit
            && limit < coupon.times_used
        {
            return Err(OrderError::constraint(format!(
                "usage limit {} is below current usage {} for coupon {}",
                limit, coupon.times_used, coupon.code
            )));
        }
        self.storage.store_coupon(&txn, &coupon)?;
        self.storage.commit(txn)?;

        tracing::info!(code = %coupon.code, usage_limit = ?coupon.usage_limit, "Coupon saved");
        Ok(coupon)
    }

    pub fn get(&self, code: &str) -> OrderResult<Coupon> {
        self.storage
            .get_coupon(code)?
            .ok_or_else(|| OrderError::CouponNotFound(code.to_string()))
    }

    /// Coupon associations of an order, in redemption order
    pub fn redemptions(&self, order_id: &str) -> OrderResult<Vec<CouponRedemption>> {
        Ok(self.storage.get_redemptions(order_id)?)
    }

    /// Redeem a coupon against a pending order.
    pub fn redeem(&self, code: &str, order_id: &str) -> OrderResult<CouponRedemption> {
        let txn = self.storage.begin_write()?;
        let mut order = self
            .storage
            .get_order_txn(&txn, order_id)?
            .ok_or_else(|| OrderError::OrderNotFound(order_id.to_string()))?;
        let redemption = self.redeem_in(&txn, code, &mut order, now_millis())?;
        self.storage.store_order(&txn, &order)?;
        self.storage.commit(txn)?;

        tracing::info!(
            order_id = %order_id,
            code = %code,
            discount = %redemption.discount,
            total = %order.total,
            "Coupon redeemed"
        );
        Ok(redemption)
    }

    /// Redeem inside an open write transaction.
    ///
    /// Updates `order` in memory (discount and total); the caller stores it.
    pub(crate) fn redeem_in(
        &self,
        txn: &WriteTransaction,
        code: &str,
        order: &mut Order,
        now: i64,
    ) -> OrderResult<CouponRedemption> {
        let mut coupon = self
            .storage
            .get_coupon_txn(txn, code)?
            .ok_or_else(|| OrderError::CouponNotFound(code.to_string()))?;

        if !coupon.is_active {
            return Err(OrderError::CouponInactive(code.to_string()));
        }
        if coupon.is_expired_at(now) {
            return Err(OrderError::CouponExpired(code.to_string()));
        }
        if coupon.is_exhausted() {
            tracing::debug!(code = %code, times_used = coupon.times_used, "Coupon limit reached");
            return Err(OrderError::CouponExhausted(code.to_string()));
        }
        if order.status != OrderStatus::Pending {
            return Err(OrderError::constraint(format!(
                "coupons can only be redeemed on pending orders, order {} is {}",
                order.id, order.status
            )));
        }

        let mut redemptions = self.storage.get_redemptions_txn(txn, &order.id)?;
        if redemptions
            .iter()
            .any(|r| r.code == code && r.state == RedemptionState::Applied)
        {
            return Err(OrderError::constraint(format!(
                "coupon {} is already applied to order {}",
                code, order.id
            )));
        }
        if let Some(min) = coupon.min_order_amount
            && order.subtotal < min
        {
            return Err(OrderError::constraint(format!(
                "order subtotal {} is below the coupon minimum {}",
                order.subtotal, min
            )));
        }

        // Clamp so the total never goes negative
        let headroom = (order.max_discount() - order.discount_amount).max(Decimal::ZERO);
        let discount = round_money(coupon.discount.amount_for(order.subtotal)).min(headroom);

        coupon.times_used += 1;
        self.storage.store_coupon(txn, &coupon)?;

        let redemption = CouponRedemption {
            order_id: order.id.clone(),
            code: code.to_string(),
            discount,
            state: RedemptionState::Applied,
            redeemed_at: now,
        };
        redemptions.push(redemption.clone());
        self.storage.store_redemptions(txn, &order.id, &redemptions)?;

        order.discount_amount = round_money(order.discount_amount + discount);
        order.recalculate_total();
        order.updated_at = now;
        Ok(redemption)
    }

    /// Reverse every applied redemption of an order, returning the number
    /// reversed. Calling it again reverses nothing.
    pub fn reverse(&self, order_id: &str) -> OrderResult<usize> {
        let txn = self.storage.begin_write()?;
        let reversed = self.reverse_in(&txn, order_id)?;
        self.storage.commit(txn)?;
        Ok(reversed)
    }

    pub(crate) fn reverse_in(
        &self,
        txn: &WriteTransaction,
        order_id: &str,
    ) -> OrderResult<usize> {
        let mut redemptions = self.storage.get_redemptions_txn(txn, order_id)?;
        let mut reversed = 0;

        for redemption in redemptions
            .iter_mut()
            .filter(|r| r.state == RedemptionState::Applied)
        {
            if let Some(mut coupon) = self.storage.get_coupon_txn(txn, &redemption.code)? {
                coupon.times_used = coupon.times_used.saturating_sub(1);
                self.storage.store_coupon(txn, &coupon)?;
            } else {
                tracing::warn!(
                    order_id = %order_id,
                    code = %redemption.code,
                    "Reversing redemption of a missing coupon"
                );
            }
            redemption.state = RedemptionState::Reversed;
            reversed += 1;
        }

        if reversed > 0 {
            self.storage.store_redemptions(txn, order_id, &redemptions)?;
            tracing::debug!(order_id = %order_id, reversed, "Coupon redemptions reversed");
        }
        Ok(reversed)
    }
}
