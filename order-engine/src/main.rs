use anyhow::Context;
use order_engine::{OrdersManager, audit_ledger, print_banner, setup_environment};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Environment (dotenv, logging) and configuration
    let config = setup_environment()?;

    print_banner();
    tracing::info!(
        environment = %config.environment,
        work_dir = %config.work_dir,
        gateway_timeout_ms = config.payment_gateway_timeout_ms,
        "Order engine starting..."
    );

    // 2. Open the ledger
    std::fs::create_dir_all(&config.work_dir)
        .with_context(|| format!("failed to create work dir {}", config.work_dir))?;
    let ledger_path = config.ledger_path();
    let manager = OrdersManager::new(&ledger_path)
        .with_context(|| format!("failed to open ledger {}", ledger_path.display()))?
        .with_gateway_timeout(config.gateway_timeout());

    // 3. Verify invariants before accepting work
    let report = audit_ledger(manager.storage())?;
    if !report.is_consistent() {
        tracing::error!(violations = report.violations.len(), "Ledger audit failed");
        anyhow::bail!("ledger has {} invariant violations", report.violations.len());
    }
    tracing::info!(
        orders = report.orders,
        inventory_rows = report.inventory_rows,
        coupons = report.coupons,
        "Ledger audit passed"
    );

    // 4. Stream status changes until shutdown
    let mut events = manager.subscribe();
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(entry) => tracing::info!(
                    order_id = %entry.order_id,
                    from = %entry.previous_status,
                    to = %entry.new_status,
                    "Status change"
                ),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Status subscriber lagged");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown signal received");
                break;
            }
        }
    }

    Ok(())
}
