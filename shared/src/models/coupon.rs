//! Coupon Model

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::money::{percentage_of, round_money};

/// Discount granted by a coupon
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CouponDiscount {
    /// Flat amount off the order
    Fixed(Decimal),
    /// Percentage (0-100) of the subtotal
    Percentage(Decimal),
}

impl CouponDiscount {
    /// Discount for an order with the given subtotal, before clamping.
    pub fn amount_for(&self, subtotal: Decimal) -> Decimal {
        match self {
            CouponDiscount::Fixed(amount) => round_money(*amount),
            CouponDiscount::Percentage(pct) => percentage_of(subtotal, *pct),
        }
    }

    pub fn is_valid(&self) -> bool {
        match self {
            CouponDiscount::Fixed(amount) => *amount >= Decimal::ZERO,
            CouponDiscount::Percentage(pct) => {
                *pct >= Decimal::ZERO && *pct <= Decimal::ONE_HUNDRED
            }
        }
    }
}

/// Coupon entity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Coupon {
    /// Redemption code, unique
    pub code: String,
    pub discount: CouponDiscount,
    /// Minimum subtotal to qualify
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_order_amount: Option<Decimal>,
    /// `None` = unlimited
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_limit: Option<u32>,
    /// Applied redemptions not yet reversed
    #[serde(default)]
    pub times_used: u32,
    /// Expiry (millis); `None` = never
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    pub is_active: bool,
}

impl Coupon {
    pub fn new(code: impl Into<String>, discount: CouponDiscount) -> Self {
        Self {
            code: code.into(),
            discount,
            min_order_amount: None,
            usage_limit: None,
            times_used: 0,
            expires_at: None,
            is_active: true,
        }
    }

    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now)
    }

    pub fn is_exhausted(&self) -> bool {
        self.usage_limit.is_some_and(|limit| self.times_used >= limit)
    }
}

/// Redemption state of an order-coupon association
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RedemptionState {
    Applied,
    Reversed,
}

/// Order-coupon association (order_coupons)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CouponRedemption {
    pub order_id: String,
    pub code: String,
    /// Discount actually granted to the order
    pub discount: Decimal,
    pub state: RedemptionState,
    pub redeemed_at: i64,
}
