//! Money arithmetic helpers using rust_decimal
//!
//! All monetary values are `Decimal` end to end. Results are rounded to
//! 2 decimal places, half away from zero.

use rust_decimal::prelude::*;

/// Rounding scale for monetary values
pub const DECIMAL_PLACES: u32 = 2;

/// Tolerance for monetary comparisons (0.01)
pub const MONEY_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Maximum allowed unit price (1,000,000)
pub const MAX_PRICE: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 0);

/// Maximum allowed payment amount (1,000,000)
pub const MAX_PAYMENT_AMOUNT: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 0);

/// Maximum allowed quantity per line item
pub const MAX_QUANTITY: u32 = 9999;

/// Round to 2 decimal places (half-up)
#[inline]
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

/// Line total: `unit_price * quantity`
pub fn line_total(unit_price: Decimal, quantity: u32) -> Decimal {
    round_money(unit_price * Decimal::from(quantity))
}

/// Order total: `subtotal + shipping_cost - discount_amount`
pub fn order_total(subtotal: Decimal, shipping_cost: Decimal, discount_amount: Decimal) -> Decimal {
    round_money(subtotal + shipping_cost - discount_amount)
}

/// Percentage of an amount, `pct` in `[0, 100]`
pub fn percentage_of(amount: Decimal, pct: Decimal) -> Decimal {
    round_money(amount * pct / Decimal::ONE_HUNDRED)
}
