//! Order stress test - randomized lifecycle traffic on a file-backed ledger
//!
//! Orders are placed, paid, shipped, delivered, cancelled and refunded in an
//! interleaved random order across blocking tasks. Afterwards the ledger is
//! reopened from disk and audited.

use order_engine::{Config, OrderError, OrdersManager, audit_ledger};
use rand::Rng;
use rust_decimal::Decimal;
use shared::models::{
    Address, Coupon, CouponDiscount, Customer, GatewayOutcome, PaymentMethod, Product,
};
use shared::order::{LineItemDraft, OrderDraft, OrderStatus};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

const ORDER_COUNT: usize = 300;
const CONCURRENCY: usize = 8;
const PRODUCT_COUNT: usize = 6;
const STOCK_PER_PRODUCT: u32 = 120;

/// Where an order's script stops
#[derive(Debug, Clone, Copy, PartialEq)]
enum Ending {
    LeftPending,
    CancelledPending,
    CancelledProcessing,
    Delivered,
    RefundedProcessing,
    RefundedDelivered,
}

fn random_ending(rng: &mut impl Rng) -> Ending {
    match rng.gen_range(0..6) {
        0 => Ending::LeftPending,
        1 => Ending::CancelledPending,
        2 => Ending::CancelledProcessing,
        3 => Ending::Delivered,
        4 => Ending::RefundedProcessing,
        _ => Ending::RefundedDelivered,
    }
}

fn random_draft(rng: &mut impl Rng) -> OrderDraft {
    let count = rng.gen_range(1..=3);
    let items = (0..count)
        .map(|_| {
            LineItemDraft::new(
                format!("p{}", rng.gen_range(0..PRODUCT_COUNT)),
                rng.gen_range(1..=4),
            )
        })
        .collect();
    let coupon_codes = if rng.gen_bool(0.3) {
        vec!["STRESS".to_string()]
    } else {
        vec![]
    };
    OrderDraft {
        customer_id: "c1".to_string(),
        billing_address_id: "a1".to_string(),
        shipping_address_id: "a1".to_string(),
        items,
        shipping_cost: Decimal::new(rng.gen_range(0..1000), 2),
        discount_amount: Decimal::ZERO,
        coupon_codes,
    }
}

fn seed(manager: &OrdersManager) {
    manager
        .catalog()
        .upsert_customer(Customer {
            id: "c1".to_string(),
            email: "stress@example.com".to_string(),
            name: "Stress".to_string(),
        })
        .unwrap();
    manager
        .catalog()
        .upsert_address(Address {
            id: "a1".to_string(),
            customer_id: "c1".to_string(),
            line1: "1 Load Street".to_string(),
            line2: None,
            city: "Benchmark".to_string(),
            postal_code: "99999".to_string(),
            country: "DE".to_string(),
        })
        .unwrap();
    for i in 0..PRODUCT_COUNT {
        manager
            .catalog()
            .upsert_product(Product::new(
                format!("p{i}"),
                format!("SKU-{i}"),
                format!("Product {i}"),
                Decimal::new(499 + i as i64 * 250, 2),
            ))
            .unwrap();
        manager
            .inventory()
            .restock(&format!("p{i}"), STOCK_PER_PRODUCT)
            .unwrap();
    }
    let mut coupon = Coupon::new("STRESS", CouponDiscount::Percentage(Decimal::TEN));
    coupon.usage_limit = Some(40);
    manager.coupons().upsert(coupon).unwrap();
}

/// Run one order script. Expected business rejections count as skipped.
fn run_order(manager: &OrdersManager, idx: usize) -> Result<bool, String> {
    let mut rng = rand::thread_rng();
    let order = match manager.place_order(random_draft(&mut rng)) {
        Ok(order) => order,
        Err(OrderError::InsufficientStock { .. } | OrderError::CouponExhausted(_)) => {
            return Ok(false);
        }
        Err(e) => return Err(format!("place failed: {e}")),
    };

    let ending = random_ending(&mut rng);
    let step = |target: OrderStatus| {
        manager
            .transition(&order.id, target, "stress", None)
            .map(|_| ())
            .map_err(|e| format!("{} -> {target} failed: {e}", order.id))
    };

    match ending {
        Ending::LeftPending => return Ok(true),
        Ending::CancelledPending => {
            step(OrderStatus::Cancelled)?;
            return Ok(true);
        }
        _ => {}
    }

    let reference = format!("stress-{idx}");
    manager
        .payments()
        .record_payment(&order.id, order.total, PaymentMethod::Card, &reference)
        .map_err(|e| format!("payment failed: {e}"))?;
    manager
        .payments()
        .confirm(&reference, GatewayOutcome::Completed)
        .map_err(|e| format!("confirm failed: {e}"))?;
    step(OrderStatus::Processing)?;

    match ending {
        Ending::CancelledProcessing => step(OrderStatus::Cancelled)?,
        Ending::RefundedProcessing => step(OrderStatus::Refunded)?,
        Ending::Delivered | Ending::RefundedDelivered => {
            step(OrderStatus::Shipped)?;
            step(OrderStatus::Delivered)?;
            if ending == Ending::RefundedDelivered {
                step(OrderStatus::Refunded)?;
            }
        }
        Ending::LeftPending | Ending::CancelledPending => {}
    }
    Ok(true)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_randomized_lifecycle_keeps_ledger_consistent() {
    let work_dir = tempfile::tempdir().unwrap();
    let config = Config::with_overrides(work_dir.path().to_string_lossy(), "stress.redb");

    println!("[1/4] Seeding ledger at {}", config.ledger_path().display());
    let manager = Arc::new(OrdersManager::new(config.ledger_path()).unwrap());
    seed(&manager);

    println!("[2/4] Running {ORDER_COUNT} orders on {CONCURRENCY} workers...");
    let start = Instant::now();
    let completed = Arc::new(AtomicUsize::new(0));
    let skipped = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::with_capacity(CONCURRENCY);
    for worker in 0..CONCURRENCY {
        let manager = manager.clone();
        let completed = completed.clone();
        let skipped = skipped.clone();
        handles.push(tokio::task::spawn_blocking(move || {
            for idx in (worker..ORDER_COUNT).step_by(CONCURRENCY) {
                match run_order(&manager, idx) {
                    Ok(true) => completed.fetch_add(1, Ordering::Relaxed),
                    Ok(false) => skipped.fetch_add(1, Ordering::Relaxed),
                    Err(e) => panic!("order {idx}: {e}"),
                };
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }
    println!(
        "      ✓ {} completed, {} rejected in {:?}",
        completed.load(Ordering::Relaxed),
        skipped.load(Ordering::Relaxed),
        start.elapsed()
    );
    assert_eq!(
        completed.load(Ordering::Relaxed) + skipped.load(Ordering::Relaxed),
        ORDER_COUNT
    );

    println!("[3/4] Auditing live ledger...");
    let report = audit_ledger(manager.storage()).unwrap();
    assert!(report.is_consistent(), "{:?}", report.violations);
    assert!(manager.coupons().get("STRESS").unwrap().times_used <= 40);

    println!("[4/4] Reopening ledger from disk...");
    drop(manager);
    let reopened = OrdersManager::new(config.ledger_path()).unwrap();
    let report = audit_ledger(reopened.storage()).unwrap();
    assert!(report.is_consistent(), "{:?}", report.violations);
    assert_eq!(
        report.orders,
        completed.load(Ordering::Relaxed),
        "every placed order persisted"
    );
    for order in reopened.storage().get_all_orders().unwrap() {
        let history = reopened.history(&order.id).unwrap();
        if let Some(last) = history.last() {
            assert_eq!(last.new_status, order.status);
        } else {
            assert_eq!(order.status, OrderStatus::Pending);
        }
    }
    println!("      ✓ {} orders audited clean", report.orders);
}
