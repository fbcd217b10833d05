//! Payment Model

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Payment status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Recorded, awaiting gateway confirmation
    Pending,
    /// Captured by the gateway
    Completed,
    /// Rejected by the gateway
    Failed,
    /// Money returned to the customer (refund row)
    Refunded,
}

impl PaymentStatus {
    pub fn is_settled(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }
}

/// Payment method
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Card,
    BankTransfer,
    Paypal,
    CashOnDelivery,
    StoreCredit,
}

/// Final answer from the payment gateway
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GatewayOutcome {
    Completed,
    Failed,
}

impl From<GatewayOutcome> for PaymentStatus {
    fn from(outcome: GatewayOutcome) -> Self {
        match outcome {
            GatewayOutcome::Completed => PaymentStatus::Completed,
            GatewayOutcome::Failed => PaymentStatus::Failed,
        }
    }
}

/// Payment row
///
/// Refunds are separate rows with `status = Refunded` and a positive `amount`
/// that counts against the order; captured rows are never rewritten by a refund.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Payment {
    pub id: String,
    pub order_id: String,
    /// Gateway reference, unique across all payments
    pub reference: String,
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    /// Captured payment this refund draws from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refund_of: Option<String>,
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settled_at: Option<i64>,
}

impl Payment {
    pub fn is_refund(&self) -> bool {
        self.status == PaymentStatus::Refunded
    }
}

/// Aggregated payment position of one order
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct PaymentSummary {
    /// Sum of completed payments
    pub completed: Decimal,
    /// Sum of refund rows
    pub refunded: Decimal,
    /// Sum of payments still awaiting the gateway
    pub pending: Decimal,
    /// `completed - refunded`
    pub net: Decimal,
    /// `max(total - completed, 0)`
    pub outstanding: Decimal,
}
