//! Data models
//!
//! Catalog, stock, customer, payment and coupon entities persisted by the
//! ledger store. All IDs are `String` (prefixed UUIDs); timestamps are UTC
//! milliseconds.

pub mod coupon;
pub mod customer;
pub mod inventory;
pub mod payment;
pub mod product;

// Re-exports
pub use coupon::*;
pub use customer::*;
pub use inventory::*;
pub use payment::*;
pub use product::*;
