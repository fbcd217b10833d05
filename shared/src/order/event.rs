//! Lifecycle events and status history

use serde::{Deserialize, Serialize};

use super::OrderStatus;

/// Event that drives an order status transition
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StatusEvent {
    /// Payment confirmed, start fulfillment
    Process,
    /// Goods handed to the carrier
    Ship,
    /// Carrier confirmed delivery
    Deliver,
    Cancel,
    Refund,
}

impl StatusEvent {
    /// Status the event leads to
    pub fn target(&self) -> OrderStatus {
        match self {
            StatusEvent::Process => OrderStatus::Processing,
            StatusEvent::Ship => OrderStatus::Shipped,
            StatusEvent::Deliver => OrderStatus::Delivered,
            StatusEvent::Cancel => OrderStatus::Cancelled,
            StatusEvent::Refund => OrderStatus::Refunded,
        }
    }

    /// The event whose transitions end in `target`, if any
    pub fn targeting(target: OrderStatus) -> Option<StatusEvent> {
        match target {
            OrderStatus::Pending => None,
            OrderStatus::Processing => Some(StatusEvent::Process),
            OrderStatus::Shipped => Some(StatusEvent::Ship),
            OrderStatus::Delivered => Some(StatusEvent::Deliver),
            OrderStatus::Cancelled => Some(StatusEvent::Cancel),
            OrderStatus::Refunded => Some(StatusEvent::Refund),
        }
    }
}

/// Append-only audit record of one status change
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusHistoryEntry {
    pub order_id: String,
    /// Global sequence, monotonic across all orders
    pub sequence: u64,
    pub previous_status: OrderStatus,
    pub new_status: OrderStatus,
    /// Who made the change (operator id, "system", "gateway", ...)
    pub actor: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub timestamp: i64,
}
