use super::*;

#[test]
fn test_place_order() {
    let manager = create_test_manager();
    let address_id = seed_customer(&manager, "c1");
    seed_product(&manager, "p1", "25.00", 10);
    seed_product(&manager, "p2", "12.50", 10);

    let order = manager
        .place_order(draft(
            "c1",
            &address_id,
            vec![LineItemDraft::new("p1", 2), LineItemDraft::new("p2", 1)],
        ))
        .unwrap();

    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.items.len(), 2);
    assert_eq!(order.subtotal, d("62.50"));
    assert_eq!(order.total, d("62.50"));
    assert!(order.id.starts_with("ord_"));

    assert_eq!(manager.inventory().availability("p1").unwrap(), 8);
    assert_eq!(manager.inventory().availability("p2").unwrap(), 9);
    assert_eq!(manager.get_order(&order.id).unwrap(), order);
}

#[test]
fn test_totals_with_shipping_and_discount() {
    let manager = create_test_manager();
    let address_id = seed_customer(&manager, "c1");
    seed_product(&manager, "p1", "50.00", 5);

    let mut request = draft("c1", &address_id, vec![LineItemDraft::new("p1", 2)]);
    request.shipping_cost = d("5.00");
    request.discount_amount = d("10.00");

    let order = manager.place_order(request).unwrap();
    assert_eq!(order.subtotal, d("100.00"));
    assert_eq!(order.total, d("95.00"));

    manager
        .payments()
        .record_payment(&order.id, d("95.00"), PaymentMethod::Card, "ref-95")
        .unwrap();
    assert!(!manager.payments().is_paid_in_full(&order.id).unwrap());
    manager
        .payments()
        .confirm("ref-95", GatewayOutcome::Completed)
        .unwrap();
    assert!(manager.payments().is_paid_in_full(&order.id).unwrap());

    let entry = manager
        .transition(&order.id, OrderStatus::Processing, "cashier", None)
        .unwrap();
    assert_eq!(entry.previous_status, OrderStatus::Pending);
    assert_eq!(entry.new_status, OrderStatus::Processing);
}

#[test]
fn test_price_snapshot_survives_catalog_change() {
    let manager = create_test_manager();
    let address_id = seed_customer(&manager, "c1");
    seed_product(&manager, "p1", "10.00", 5);

    let order = manager
        .place_order(draft("c1", &address_id, vec![LineItemDraft::new("p1", 1)]))
        .unwrap();

    manager
        .catalog()
        .upsert_product(Product::new("p1", "SKU-p1", "Renamed", d("99.00")))
        .unwrap();

    let stored = manager.get_order(&order.id).unwrap();
    assert_eq!(stored.items[0].unit_price, d("10.00"));
    assert_eq!(stored.items[0].name, "Product p1");
    assert_eq!(stored.total, d("10.00"));
}

#[test]
fn test_duplicate_lines_are_merged() {
    let manager = create_test_manager();
    let address_id = seed_customer(&manager, "c1");
    seed_product(&manager, "p1", "1.00", 5);

    let order = manager
        .place_order(draft(
            "c1",
            &address_id,
            vec![LineItemDraft::new("p1", 2), LineItemDraft::new("p1", 3)],
        ))
        .unwrap();
    assert_eq!(order.items.len(), 1);
    assert_eq!(order.items[0].quantity, 5);
    assert_eq!(manager.inventory().availability("p1").unwrap(), 0);
}

#[test]
fn test_insufficient_stock_rejects_whole_order() {
    let manager = create_test_manager();
    let address_id = seed_customer(&manager, "c1");
    seed_product(&manager, "p1", "1.00", 5);
    seed_product(&manager, "p2", "1.00", 1);

    let err = manager
        .place_order(draft(
            "c1",
            &address_id,
            vec![LineItemDraft::new("p1", 2), LineItemDraft::new("p2", 2)],
        ))
        .unwrap_err();
    assert!(matches!(
        err,
        OrderError::InsufficientStock {
            ref product_id,
            requested: 2,
            available: 1
        } if product_id == "p2"
    ));

    // nothing was reserved, nothing was stored
    assert_eq!(manager.inventory().availability("p1").unwrap(), 5);
    assert!(manager.storage().get_all_orders().unwrap().is_empty());
    assert!(manager.storage().get_all_reservations().unwrap().is_empty());
}

#[test]
fn test_placement_validation() {
    let manager = create_test_manager();
    let address_id = seed_customer(&manager, "c1");
    let other_address = seed_customer(&manager, "c2");
    seed_product(&manager, "p1", "10.00", 5);

    let empty = draft("c1", &address_id, vec![]);
    assert!(matches!(manager.place_order(empty), Err(OrderError::ConstraintViolation(_))));

    let unknown_customer = draft("ghost", &address_id, vec![LineItemDraft::new("p1", 1)]);
    assert!(matches!(
        manager.place_order(unknown_customer),
        Err(OrderError::CustomerNotFound(_))
    ));

    let foreign_address = draft("c1", &other_address, vec![LineItemDraft::new("p1", 1)]);
    assert!(matches!(
        manager.place_order(foreign_address),
        Err(OrderError::ConstraintViolation(_))
    ));

    let unknown_product = draft("c1", &address_id, vec![LineItemDraft::new("nope", 1)]);
    assert!(matches!(
        manager.place_order(unknown_product),
        Err(OrderError::ProductNotFound(_))
    ));

    let mut negative_shipping = draft("c1", &address_id, vec![LineItemDraft::new("p1", 1)]);
    negative_shipping.shipping_cost = d("-1.00");
    assert!(matches!(
        manager.place_order(negative_shipping),
        Err(OrderError::ConstraintViolation(_))
    ));

    let mut huge_discount = draft("c1", &address_id, vec![LineItemDraft::new("p1", 1)]);
    huge_discount.discount_amount = d("10.01");
    assert!(matches!(
        manager.place_order(huge_discount),
        Err(OrderError::ConstraintViolation(_))
    ));

    let zero_quantity = draft("c1", &address_id, vec![LineItemDraft::new("p1", 0)]);
    assert!(matches!(
        manager.place_order(zero_quantity),
        Err(OrderError::ConstraintViolation(_))
    ));

    assert_eq!(manager.inventory().availability("p1").unwrap(), 5);
}

#[test]
fn test_inactive_product_cannot_be_ordered() {
    let manager = create_test_manager();
    let address_id = seed_customer(&manager, "c1");
    let mut product = Product::new("p1", "SKU-p1", "Retired", d("3.00"));
    product.is_active = false;
    manager.catalog().upsert_product(product).unwrap();
    manager.inventory().restock("p1", 3).unwrap();

    let err = manager
        .place_order(draft("c1", &address_id, vec![LineItemDraft::new("p1", 1)]))
        .unwrap_err();
    assert!(matches!(err, OrderError::ConstraintViolation(_)));
}

#[test]
fn test_invalid_transition_leaves_no_history() {
    let manager = create_test_manager();
    let address_id = seed_customer(&manager, "c1");
    seed_product(&manager, "p1", "10.00", 5);
    let order = manager
        .place_order(draft("c1", &address_id, vec![LineItemDraft::new("p1", 1)]))
        .unwrap();

    let err = manager
        .transition(&order.id, OrderStatus::Delivered, "tester", None)
        .unwrap_err();
    assert!(matches!(err, OrderError::InvalidTransition { .. }));
    assert_eq!(err.code(), shared::error::ErrorCode::InvalidTransition);
    assert!(manager.history(&order.id).unwrap().is_empty());
    assert_eq!(manager.get_order(&order.id).unwrap().status, OrderStatus::Pending);
}

#[test]
fn test_unpaid_order_cannot_be_processed() {
    let manager = create_test_manager();
    let address_id = seed_customer(&manager, "c1");
    seed_product(&manager, "p1", "10.00", 5);
    let order = manager
        .place_order(draft("c1", &address_id, vec![LineItemDraft::new("p1", 1)]))
        .unwrap();

    let err = manager
        .transition(&order.id, OrderStatus::Processing, "tester", None)
        .unwrap_err();
    assert!(matches!(err, OrderError::PaymentRequired(_)));
}
