//! Payment Reconciliation
//!
//! Payments are recorded `pending`, then settled by the gateway callback
//! ([`PaymentReconciler::confirm`]). Refunds are new rows with status
//! `refunded`; a captured payment is never rewritten.
//!
//! An order is paid in full when the sum of its completed payments covers
//! `order.total`. That predicate gates `pending -> processing`.

use async_trait::async_trait;
use rust_decimal::Decimal;
use shared::models::{GatewayOutcome, Payment, PaymentMethod, PaymentStatus, PaymentSummary};
use shared::money::{MAX_PAYMENT_AMOUNT, MONEY_TOLERANCE, round_money};
use shared::util::{now_millis, prefixed_id};
use std::time::Duration;
use thiserror::Error;

use super::error::{OrderError, OrderResult};
use super::storage::LedgerStore;

/// Failure talking to the payment gateway
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway unavailable: {0}")]
    Unavailable(String),

    #[error("gateway rejected request: {0}")]
    Rejected(String),
}

/// External payment gateway
///
/// Answers whether the money movement behind `reference` went through.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn confirm(&self, reference: &str) -> Result<GatewayOutcome, GatewayError>;
}

/// Result of [`PaymentReconciler::settle_with_gateway`]
#[derive(Debug, Clone, PartialEq)]
pub enum SettleOutcome {
    /// Payment is now completed or failed
    Settled(Payment),
    /// Gateway did not answer in time; payment is still pending
    TimedOut(Payment),
}

/// Sum an order's payment rows against its total.
pub fn summarize(payments: &[Payment], total: Decimal) -> PaymentSummary {
    let mut summary = PaymentSummary::default();
    for payment in payments {
        match payment.status {
            PaymentStatus::Completed => summary.completed += payment.amount,
            PaymentStatus::Refunded => summary.refunded += payment.amount,
            PaymentStatus::Pending => summary.pending += payment.amount,
            PaymentStatus::Failed => {}
        }
    }
    summary.completed = round_money(summary.completed);
    summary.refunded = round_money(summary.refunded);
    summary.pending = round_money(summary.pending);
    summary.net = summary.completed - summary.refunded;
    summary.outstanding = (total - summary.completed).max(Decimal::ZERO);
    summary
}

/// Default wait for a gateway confirmation
pub const DEFAULT_GATEWAY_TIMEOUT: Duration = Duration::from_secs(10);

/// Payment recording, settlement and refunds
#[derive(Debug, Clone)]
pub struct PaymentReconciler {
    storage: LedgerStore,
    gateway_timeout: Duration,
}

impl PaymentReconciler {
    pub fn new(storage: LedgerStore) -> Self {
        Self {
            storage,
            gateway_timeout: DEFAULT_GATEWAY_TIMEOUT,
        }
    }

    pub fn with_gateway_timeout(mut self, timeout: Duration) -> Self {
        self.gateway_timeout = timeout;
        self
    }

    /// Record a payment attempt in `pending` status.
    pub fn record_payment(
        &self,
        order_id: &str,
        amount: Decimal,
        method: PaymentMethod,
        reference: &str,
    ) -> OrderResult<Payment> {
        let amount = validate_amount(amount)?;
        if reference.trim().is_empty() {
            return Err(OrderError::constraint("payment reference must not be empty"));
        }

        let txn = self.storage.begin_write()?;
        let order = self
            .storage
            .get_order_txn(&txn, order_id)?
            .ok_or_else(|| OrderError::OrderNotFound(order_id.to_string()))?;
        if order.status.is_closed() {
            return Err(OrderError::constraint(format!(
                "order {} is {}, it takes no more payments",
                order_id, order.status
            )));
        }

        let existing = self.storage.get_payments_for_order_txn(&txn, order_id)?;
        let summary = summarize(&existing, order.total);
        if amount > summary.outstanding + MONEY_TOLERANCE {
            return Err(OrderError::constraint(format!(
                "payment amount ({}) exceeds remaining unpaid ({})",
                amount, summary.outstanding
            )));
        }

        let payment = Payment {
            id: prefixed_id("pay"),
            order_id: order_id.to_string(),
            reference: reference.to_string(),
            amount,
            method,
            status: PaymentStatus::Pending,
            refund_of: None,
            created_at: now_millis(),
            settled_at: None,
        };
        if !self.storage.insert_payment(&txn, &payment)? {
            tracing::warn!(
                order_id = %order_id,
                reference = %reference,
                "Duplicate payment reference"
            );
            return Err(OrderError::DuplicatePayment(reference.to_string()));
        }
        self.storage.commit(txn)?;

        tracing::info!(
            order_id = %order_id,
            payment_id = %payment.id,
            amount = %payment.amount,
            method = ?method,
            "Payment recorded"
        );
        Ok(payment)
    }

    /// Gateway callback: settle a pending payment.
    ///
    /// Repeating the outcome a payment already has is a no-op. A conflicting
    /// outcome for a settled payment is rejected.
    pub fn confirm(&self, reference: &str, outcome: GatewayOutcome) -> OrderResult<Payment> {
        let txn = self.storage.begin_write()?;
        let payment_id = self
            .storage
            .find_payment_by_reference_txn(&txn, reference)?
            .ok_or_else(|| OrderError::PaymentNotFound(reference.to_string()))?;
        let mut payment = self
            .storage
            .get_payment_txn(&txn, &payment_id)?
            .ok_or_else(|| OrderError::PaymentNotFound(reference.to_string()))?;

        let target = PaymentStatus::from(outcome);
        if payment.status == target {
            tracing::debug!(reference = %reference, status = ?target, "Payment already settled");
            return Ok(payment);
        }
        if payment.status != PaymentStatus::Pending {
            return Err(OrderError::constraint(format!(
                "payment {} is {:?}, cannot become {:?}",
                reference, payment.status, target
            )));
        }

        payment.status = target;
        payment.settled_at = Some(now_millis());
        self.storage.store_payment(&txn, &payment)?;
        self.storage.commit(txn)?;

        tracing::info!(
            order_id = %payment.order_id,
            reference = %reference,
            status = ?payment.status,
            "Payment settled"
        );
        Ok(payment)
    }

    /// Ask the gateway for the outcome of a pending payment, waiting at most
    /// the configured gateway timeout. On timeout the payment stays `pending`.
    pub async fn settle_with_gateway(
        &self,
        gateway: &dyn PaymentGateway,
        reference: &str,
    ) -> OrderResult<SettleOutcome> {
        let timeout = self.gateway_timeout;
        let payment = self.get_by_reference(reference)?;
        if payment.status != PaymentStatus::Pending {
            return Ok(SettleOutcome::Settled(payment));
        }

        match tokio::time::timeout(timeout, gateway.confirm(reference)).await {
            Ok(Ok(outcome)) => Ok(SettleOutcome::Settled(self.confirm(reference, outcome)?)),
            Ok(Err(e)) => {
                tracing::warn!(
                    reference = %reference,
                    error = %e,
                    "Gateway error, payment left pending"
                );
                Err(OrderError::Gateway(e.to_string()))
            }
            Err(_elapsed) => {
                tracing::warn!(
                    reference = %reference,
                    timeout_ms = timeout.as_millis() as u64,
                    "Gateway timed out, payment left pending"
                );
                Ok(SettleOutcome::TimedOut(payment))
            }
        }
    }

    /// Refund part or all of the captured money as a new `refunded` row.
    pub fn refund(
        &self,
        order_id: &str,
        amount: Decimal,
        reference: &str,
    ) -> OrderResult<Payment> {
        let amount = validate_amount(amount)?;
        if reference.trim().is_empty() {
            return Err(OrderError::constraint("refund reference must not be empty"));
        }

        let txn = self.storage.begin_write()?;
        let order = self
            .storage
            .get_order_txn(&txn, order_id)?
            .ok_or_else(|| OrderError::OrderNotFound(order_id.to_string()))?;
        let existing = self.storage.get_payments_for_order_txn(&txn, order_id)?;
        let summary = summarize(&existing, order.total);
        if amount > summary.net {
            return Err(OrderError::constraint(format!(
                "refund amount ({}) exceeds captured net ({})",
                amount, summary.net
            )));
        }

        // Link to the most recent captured payment
        let source = existing
            .iter()
            .rev()
            .find(|p| p.status == PaymentStatus::Completed)
            .ok_or_else(|| {
                OrderError::PaymentRequired(format!("order {} has no completed payment", order_id))
            })?;

        let now = now_millis();
        let refund = Payment {
            id: prefixed_id("pay"),
            order_id: order_id.to_string(),
            reference: reference.to_string(),
            amount,
            method: source.method,
            status: PaymentStatus::Refunded,
            refund_of: Some(source.id.clone()),
            created_at: now,
            settled_at: Some(now),
        };
        if !self.storage.insert_payment(&txn, &refund)? {
            return Err(OrderError::DuplicatePayment(reference.to_string()));
        }
        self.storage.commit(txn)?;

        tracing::info!(order_id = %order_id, amount = %refund.amount, "Refund recorded");
        Ok(refund)
    }

    pub fn get_by_reference(&self, reference: &str) -> OrderResult<Payment> {
        let payment_id = self
            .storage
            .find_payment_by_reference(reference)?
            .ok_or_else(|| OrderError::PaymentNotFound(reference.to_string()))?;
        self.storage
            .get_payment(&payment_id)?
            .ok_or_else(|| OrderError::PaymentNotFound(reference.to_string()))
    }

    pub fn payments(&self, order_id: &str) -> OrderResult<Vec<Payment>> {
        Ok(self.storage.get_payments_for_order(order_id)?)
    }

    pub fn summary(&self, order_id: &str) -> OrderResult<PaymentSummary> {
        let order = self
            .storage
            .get_order(order_id)?
            .ok_or_else(|| OrderError::OrderNotFound(order_id.to_string()))?;
        let payments = self.storage.get_payments_for_order(order_id)?;
        Ok(summarize(&payments, order.total))
    }

    /// Sum of completed payments covers the order total
    pub fn is_paid_in_full(&self, order_id: &str) -> OrderResult<bool> {
        let order = self
            .storage
            .get_order(order_id)?
            .ok_or_else(|| OrderError::OrderNotFound(order_id.to_string()))?;
        let payments = self.storage.get_payments_for_order(order_id)?;
        Ok(summarize(&payments, order.total).completed >= order.total)
    }
}

/// Round to cents, then bound-check the rounded amount.
fn validate_amount(amount: Decimal) -> OrderResult<Decimal> {
    let amount = round_money(amount);
    if amount <= Decimal::ZERO {
        return Err(OrderError::constraint(format!(
            "payment amount must be positive, got {}",
            amount
        )));
    }
    if amount > MAX_PAYMENT_AMOUNT {
        return Err(OrderError::constraint(format!(
            "payment amount exceeds maximum allowed ({}), got {}",
            MAX_PAYMENT_AMOUNT, amount
        )));
    }
    Ok(amount)
}
