//! Inventory and reservation models

use serde::{Deserialize, Serialize};

/// Stock counts for one product
///
/// Invariant: `reserved <= quantity`. Both are unsigned, so `>= 0` holds by type.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct InventoryRecord {
    /// On-hand units
    pub quantity: u32,
    /// Units committed to open orders
    pub reserved: u32,
    /// Last restock time (millis); untouched by reservations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_restocked: Option<i64>,
}

impl InventoryRecord {
    /// Units that can still be reserved
    pub fn available(&self) -> u32 {
        self.quantity.saturating_sub(self.reserved)
    }

    pub fn is_consistent(&self) -> bool {
        self.reserved <= self.quantity
    }
}

/// Reservation lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReservationState {
    /// Stock is earmarked for the order
    Held,
    /// Earmark returned to available stock
    Released,
    /// Stock left the warehouse
    Committed,
}

/// One reserved line
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReservationLine {
    pub product_id: String,
    pub quantity: u32,
}

/// Stock reservation held by one order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Reservation {
    pub order_id: String,
    pub lines: Vec<ReservationLine>,
    pub state: ReservationState,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Reservation {
    pub fn is_held(&self) -> bool {
        self.state == ReservationState::Held
    }
}
