//! Order Engine - order lifecycle and inventory consistency core
//!
//! # Overview
//!
//! Keeps orders, stock, payments and coupon usage consistent under
//! concurrent access:
//!
//! - **Inventory** (`orders::inventory`): reservations never oversell
//! - **Lifecycle** (`orders::lifecycle`): explicit state machine with history
//! - **Payments** (`orders::payments`): recording, gateway settlement, refunds
//! - **Coupons** (`orders::coupons`): usage limits that hold under races
//! - **Audit** (`audit`): re-checks every cross-row invariant
//!
//! # Module Layout
//!
//! ```text
//! order-engine/src/
//! ├── core/          # configuration
//! ├── audit/         # ledger consistency audit
//! ├── utils/         # logging
//! └── orders/        # storage, engines and OrdersManager
//! ```

pub mod audit;
pub mod core;
pub mod orders;
pub mod utils;

// Re-export public types
pub use audit::{AuditReport, Violation, audit_ledger};
pub use core::Config;
pub use orders::{LedgerStore, OrderError, OrderResult, OrdersManager};

// Re-export unified error codes from shared
pub use shared::error::ErrorCode;

// Re-export logger functions
pub use utils::logger::init_logger_with_file;

/// Load `.env`, then initialize logging from the environment.
pub fn setup_environment() -> anyhow::Result<Config> {
    if let Err(e) = dotenv::dotenv()
        && !e.not_found()
    {
        anyhow::bail!("failed to load .env: {e}");
    }

    let config = Config::from_env();
    init_logger_with_file(
        Some(&config.log_level),
        Some(config.is_production()),
        config.log_dir.as_deref(),
    );
    Ok(config)
}

pub fn print_banner() {
    println!(
        r#"
   ____          __
  / __ \________/ /__  _____
 / / / / ___/ __  / _ \/ ___/
/ /_/ / /  / /_/ /  __/ /
\____/_/   \__,_/\___/_/   engine
    "#
    );
}
