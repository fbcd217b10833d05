use super::*;
use shared::models::{
    Address, Coupon, CouponDiscount, Customer, GatewayOutcome, PaymentMethod, Product,
};
use shared::order::LineItemDraft;

fn d(s: &str) -> Decimal {
    Decimal::from_str_exact(s).unwrap()
}

fn create_test_manager() -> OrdersManager {
    let storage = LedgerStore::open_in_memory().unwrap();
    OrdersManager::with_storage(storage)
}

// ========================================================================
// Helper: seed a customer with one address, and a product with stock
// ========================================================================

fn seed_customer(manager: &OrdersManager, customer_id: &str) -> String {
    manager
        .catalog()
        .upsert_customer(Customer {
            id: customer_id.to_string(),
            email: format!("{customer_id}@example.com"),
            name: "Test Customer".to_string(),
        })
        .unwrap();
    let address_id = format!("addr_{customer_id}");
    manager
        .catalog()
        .upsert_address(Address {
            id: address_id.clone(),
            customer_id: customer_id.to_string(),
            line1: "1 Test Street".to_string(),
            line2: None,
            city: "Testville".to_string(),
            postal_code: "00001".to_string(),
            country: "ES".to_string(),
        })
        .unwrap();
    address_id
}

fn seed_product(manager: &OrdersManager, product_id: &str, price: &str, stock: u32) {
    manager
        .catalog()
        .upsert_product(Product::new(
            product_id,
            format!("SKU-{product_id}"),
            format!("Product {product_id}"),
            d(price),
        ))
        .unwrap();
    if stock > 0 {
        manager.inventory().restock(product_id, stock).unwrap();
    }
}

fn draft(customer_id: &str, address_id: &str, items: Vec<LineItemDraft>) -> OrderDraft {
    OrderDraft {
        customer_id: customer_id.to_string(),
        billing_address_id: address_id.to_string(),
        shipping_address_id: address_id.to_string(),
        items,
        shipping_cost: Decimal::ZERO,
        discount_amount: Decimal::ZERO,
        coupon_codes: vec![],
    }
}

// ========================================================================
// Helper: place an order and pay it in full
// ========================================================================

fn place_paid_order(manager: &OrdersManager, product_id: &str, quantity: u32) -> Order {
    let address_id = seed_customer(manager, "c_paid");
    let order = manager
        .place_order(draft(
            "c_paid",
            &address_id,
            vec![LineItemDraft::new(product_id, quantity)],
        ))
        .unwrap();
    let reference = format!("ref_{}", order.id);
    manager
        .payments()
        .record_payment(&order.id, order.total, PaymentMethod::Card, &reference)
        .unwrap();
    manager
        .payments()
        .confirm(&reference, GatewayOutcome::Completed)
        .unwrap();
    order
}

mod test_core;
