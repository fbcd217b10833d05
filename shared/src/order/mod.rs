//! Order module
//!
//! - Drafts: what a caller submits to place an order
//! - Snapshot: the persisted order with its immutable line items
//! - Events: lifecycle events and the append-only status history

pub mod event;
pub mod snapshot;
pub mod types;

// Re-exports
pub use event::{StatusEvent, StatusHistoryEntry};
pub use snapshot::{Order, OrderItem, OrderStatus};
pub use types::{LineItemDraft, OrderDraft};
