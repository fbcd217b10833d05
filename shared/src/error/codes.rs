//! Error code table

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// All error codes are represented as u16 values for efficient serialization
/// and cross-language compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,
    /// Unknown error
    Unknown = 1,
    /// Generic invariant breach (negative total, bad quantity, ...)
    ConstraintViolation = 2,
    /// Resource not found
    NotFound = 3,

    // ==================== 4xxx: Order ====================
    /// Order not found
    OrderNotFound = 4001,
    /// Status transition not in the transition table
    InvalidTransition = 4002,
    /// Customer not found
    CustomerNotFound = 4003,

    // ==================== 5xxx: Payment ====================
    /// Payment not found
    PaymentNotFound = 5001,
    /// Payment reference already recorded
    DuplicatePayment = 5002,
    /// Transition requires a payment condition that is not met
    PaymentRequired = 5003,
    /// Payment gateway failed to answer
    GatewayError = 5004,

    // ==================== 6xxx: Product / inventory ====================
    /// Product not found
    ProductNotFound = 6001,
    /// Not enough unreserved stock
    InsufficientStock = 6002,

    // ==================== 7xxx: Coupon ====================
    /// Coupon not found
    CouponNotFound = 7001,
    /// Coupon usage limit reached
    CouponExhausted = 7002,
    /// Coupon past its expiry
    CouponExpired = 7003,
    /// Coupon disabled
    CouponInactive = 7004,

    // ==================== 9xxx: System ====================
    /// Storage layer failure
    StorageError = 9001,
}

impl ErrorCode {
    /// Numeric code
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Whether this is the success code
    #[inline]
    pub const fn is_success(&self) -> bool {
        matches!(self, ErrorCode::Success)
    }

    /// Default English message
    pub const fn message(&self) -> &'static str {
        match self {
            ErrorCode::Success => "Operation completed successfully",
            ErrorCode::Unknown => "An unknown error occurred",
            ErrorCode::ConstraintViolation => "Constraint violation",
            ErrorCode::NotFound => "Resource not found",
            ErrorCode::OrderNotFound => "Order not found",
            ErrorCode::InvalidTransition => "Invalid order status transition",
            ErrorCode::CustomerNotFound => "Customer not found",
            ErrorCode::PaymentNotFound => "Payment not found",
            ErrorCode::DuplicatePayment => "Payment reference already recorded",
            ErrorCode::PaymentRequired => "Order payment condition not met",
            ErrorCode::GatewayError => "Payment gateway error",
            ErrorCode::ProductNotFound => "Product not found",
            ErrorCode::InsufficientStock => "Insufficient stock",
            ErrorCode::CouponNotFound => "Coupon not found",
            ErrorCode::CouponExhausted => "Coupon usage limit reached",
            ErrorCode::CouponExpired => "Coupon has expired",
            ErrorCode::CouponInactive => "Coupon is not active",
            ErrorCode::StorageError => "Storage error",
        }
    }
}

impl From<ErrorCode> for u16 {
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Returned when a u16 does not name a known [`ErrorCode`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl std::error::Error for InvalidErrorCode {}

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ErrorCode::Success),
            1 => Ok(ErrorCode::Unknown),
            2 => Ok(ErrorCode::ConstraintViolation),
            3 => Ok(ErrorCode::NotFound),

            4001 => Ok(ErrorCode::OrderNotFound),
            4002 => Ok(ErrorCode::InvalidTransition),
            4003 => Ok(ErrorCode::CustomerNotFound),

            5001 => Ok(ErrorCode::PaymentNotFound),
            5002 => Ok(ErrorCode::DuplicatePayment),
            5003 => Ok(ErrorCode::PaymentRequired),
            5004 => Ok(ErrorCode::GatewayError),

            6001 => Ok(ErrorCode::ProductNotFound),
            6002 => Ok(ErrorCode::InsufficientStock),

            7001 => Ok(ErrorCode::CouponNotFound),
            7002 => Ok(ErrorCode::CouponExhausted),
            7003 => Ok(ErrorCode::CouponExpired),
            7004 => Ok(ErrorCode::CouponInactive),

            9001 => Ok(ErrorCode::StorageError),

            _ => Err(InvalidErrorCode(value)),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
