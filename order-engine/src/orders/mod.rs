//! Order lifecycle and inventory consistency
//!
//! - **storage**: redb ledger for products, stock, orders, payments and coupons
//! - **inventory**: stock reservation, release and commit
//! - **lifecycle**: the order state machine and its transition table
//! - **payments**: payment recording, gateway settlement and refunds
//! - **coupons**: coupon redemption with usage limits
//! - **catalog**: product, customer and address reference data
//! - **manager**: `OrdersManager`, order placement and the public entry point
//!
//! # Architecture
//!
//! ```text
//! OrdersManager ──► place_order ──► InventoryEngine::reserve_in
//!       │                      └──► CouponTracker::redeem_in
//!       │
//!       └──► transition ──► StateMachine ──► commit / release / reverse
//!                 │
//!             Broadcast                 all inside one redb write transaction
//!                 ↓
//!          All Subscribers
//! ```
//!
//! redb serializes write transactions, so every check-then-write sequence
//! above runs against state no other writer can change underneath it.

pub mod catalog;
pub mod coupons;
pub mod error;
pub mod inventory;
pub mod lifecycle;
pub mod manager;
pub mod payments;
pub mod storage;

// Re-exports
pub use catalog::Catalog;
pub use coupons::CouponTracker;
pub use error::{OrderError, OrderResult};
pub use inventory::InventoryEngine;
pub use lifecycle::{Guard, SideEffect, StateMachine, TRANSITIONS, Transition};
pub use manager::OrdersManager;
pub use payments::{GatewayError, PaymentGateway, PaymentReconciler, SettleOutcome};
pub use storage::{LedgerStore, StorageError, StorageResult};

// Re-export shared types for convenience
pub use shared::order::{Order, OrderDraft, OrderStatus, StatusEvent, StatusHistoryEntry};
