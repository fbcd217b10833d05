//! Shared types for the order ledger
//!
//! Domain entities, closed status enums, money helpers and error codes used by
//! `order-engine` and by anything that talks to it.

pub mod error;
pub mod models;
pub mod money;
pub mod order;
pub mod util;

// Re-exports
pub use error::ErrorCode;
pub use rust_decimal::Decimal;
pub use serde::{Deserialize, Serialize};
