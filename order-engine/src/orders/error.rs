use super::storage::StorageError;
use shared::error::ErrorCode;
use shared::order::OrderStatus;
use thiserror::Error;

/// Errors reported by the order engine
///
/// Every error is returned to the caller synchronously. Errors raised inside a
/// write transaction abort it, so no partial reservation, redemption or
/// transition is ever persisted.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: String,
        requested: u32,
        available: u32,
    },

    #[error("Invalid transition: {from} -> {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("Coupon exhausted: {0}")]
    CouponExhausted(String),

    #[error("Coupon expired: {0}")]
    CouponExpired(String),

    #[error("Coupon inactive: {0}")]
    CouponInactive(String),

    #[error("Duplicate payment reference: {0}")]
    DuplicatePayment(String),

    #[error("Payment required: {0}")]
    PaymentRequired(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("Product not found: {0}")]
    ProductNotFound(String),

    #[error("Customer not found: {0}")]
    CustomerNotFound(String),

    #[error("Payment not found: {0}")]
    PaymentNotFound(String),

    #[error("Coupon not found: {0}")]
    CouponNotFound(String),

    #[error("Payment gateway error: {0}")]
    Gateway(String),
}

impl OrderError {
    /// Convenience constructor for [`OrderError::ConstraintViolation`]
    pub fn constraint(msg: impl Into<String>) -> Self {
        OrderError::ConstraintViolation(msg.into())
    }

    /// Stable error code for callers
    pub fn code(&self) -> ErrorCode {
        match self {
            OrderError::Storage(e) => {
                tracing::error!(error = %e, "Storage error occurred");
                ErrorCode::StorageError
            }
            OrderError::InsufficientStock { .. } => ErrorCode::InsufficientStock,
            OrderError::InvalidTransition { .. } => ErrorCode::InvalidTransition,
            OrderError::CouponExhausted(_) => ErrorCode::CouponExhausted,
            OrderError::CouponExpired(_) => ErrorCode::CouponExpired,
            OrderError::CouponInactive(_) => ErrorCode::CouponInactive,
            OrderError::DuplicatePayment(_) => ErrorCode::DuplicatePayment,
            OrderError::PaymentRequired(_) => ErrorCode::PaymentRequired,
            OrderError::ConstraintViolation(_) => ErrorCode::ConstraintViolation,
            OrderError::OrderNotFound(_) => ErrorCode::OrderNotFound,
            OrderError::ProductNotFound(_) => ErrorCode::ProductNotFound,
            OrderError::CustomerNotFound(_) => ErrorCode::CustomerNotFound,
            OrderError::PaymentNotFound(_) => ErrorCode::PaymentNotFound,
            OrderError::CouponNotFound(_) => ErrorCode::CouponNotFound,
            OrderError::Gateway(_) => ErrorCode::GatewayError,
        }
    }
}

pub type OrderResult<T> = Result<T, OrderError>;
