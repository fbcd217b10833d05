//! Unified error codes for the order ledger
//!
//! [`ErrorCode`] is the stable, serializable classification of every failure
//! the order engine reports. Callers (API layers, clients) switch on the code;
//! the human-readable message stays with the engine's error type.
//!
//! # Error Code Ranges
//!
//! - 0xxx: General errors
//! - 4xxx: Order errors
//! - 5xxx: Payment errors
//! - 6xxx: Product / inventory errors
//! - 7xxx: Coupon errors
//! - 9xxx: System errors

mod codes;

pub use codes::{ErrorCode, InvalidErrorCode};
