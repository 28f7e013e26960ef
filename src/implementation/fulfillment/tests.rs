//! Fulfillment processor tests.

use std::sync::Arc;

use super::{FulfillmentProcessor, FulfillmentRequestLine};
use crate::errors::CommerceError;
use crate::implementation::inventory::{InventoryLocation, InventoryService, VariantId};
use crate::implementation::order_management::types::basic_types::{
    FulfillmentStatus, OrderStatus, PaymentStatus, WorkflowStatus,
};
use crate::implementation::order_management::types::order::Order;
use crate::implementation::order_management::{DraftLineInput, DraftOrderInput, OrderService};
use crate::payments::ledger::OrderPayment;
use crate::types::common::{Address, Currency, StoreId};

struct Fixture {
    inventory: Arc<InventoryService>,
    orders:    Arc<OrderService>,
    processor: FulfillmentProcessor,
}

/// One store, one variant in stock, one open order for `quantity` units.
fn fixture_with_order(available: i64, quantity: u32) -> (Fixture, Order) {
    let inventory = Arc::new(InventoryService::new());
    let orders = Arc::new(OrderService::new());

    let store_id = StoreId::new("store_a");
    let location = InventoryLocation::new(store_id.clone(), "Main Warehouse", true);
    let location_id = location.id.clone();
    inventory.add_location(location).unwrap();
    let variant_id = VariantId::new("var_1");
    inventory.upsert_item(variant_id.clone(), Some("SKU-1".to_string())).unwrap();
    inventory
        .set_available(&variant_id, &location_id, available, "Initial stock", None)
        .unwrap();

    let draft = orders
        .create_draft_order(DraftOrderInput {
            store_id,
            customer_email: "buyer@example.com".to_string(),
            currency: Currency::usd(),
            lines: vec![DraftLineInput {
                variant_id,
                listing_id: None,
                title: "Widget".to_string(),
                sku: Some("SKU-1".to_string()),
                quantity,
                unit_price_amount: 1000,
                discount_amount: 0,
            }],
            discount: None,
            shipping_amount: 0,
            tax_amount: 0,
            shipping_address: Address::default(),
            billing_address: None,
        })
        .unwrap();
    let order = orders.complete_draft_order(&draft.id, false, &inventory).unwrap();

    let processor = FulfillmentProcessor::new(Arc::clone(&orders), Arc::clone(&inventory));
    (Fixture { inventory, orders, processor }, order)
}

fn line(order: &Order, quantity: u32) -> FulfillmentRequestLine {
    FulfillmentRequestLine { order_item_id: order.items[0].id.clone(), quantity }
}

#[test]
fn partial_fulfillment_ships_committed_stock_only() {
    let (f, order) = fixture_with_order(10, 3);

    let updated = f.processor.fulfill_order(&order.id, &[line(&order, 2)], None, None, None).unwrap();
    assert_eq!(updated.fulfillment_status, FulfillmentStatus::Partial);
    assert_eq!(updated.items[0].fulfilled_quantity, 2);
    assert_eq!(updated.fulfillments.len(), 1);
    assert!(updated.fulfilled_at.is_none());

    let location = f.inventory.default_location(&StoreId::new("store_a")).unwrap();
    let level = f.inventory.level_for_variant(&VariantId::new("var_1"), &location.id).unwrap();
    // Reserve took available 10 -> 7; fulfillment moves committed and
    // on-hand, never available.
    assert_eq!(level.available, 7);
    assert_eq!(level.committed, 1);
    assert_eq!(level.on_hand, 8);
    assert_eq!(level.shipped, 2);
}

#[test]
fn full_fulfillment_stamps_fulfilled_at() {
    let (f, order) = fixture_with_order(10, 3);

    f.processor.fulfill_order(&order.id, &[line(&order, 2)], None, None, None).unwrap();
    let updated = f
        .processor
        .fulfill_order(
            &order.id,
            &[line(&order, 1)],
            Some("UPS".to_string()),
            Some("1Z999".to_string()),
            Some("user_1".to_string()),
        )
        .unwrap();

    assert_eq!(updated.fulfillment_status, FulfillmentStatus::Fulfilled);
    assert!(updated.fulfilled_at.is_some());
    assert_eq!(updated.fulfillments.len(), 2);
    assert_eq!(updated.fulfillments[1].carrier.as_deref(), Some("UPS"));
    assert_eq!(updated.fulfillments[1].tracking_number.as_deref(), Some("1Z999"));
}

#[test]
fn paid_and_fulfilled_derives_completed() {
    let (f, order) = fixture_with_order(10, 3);
    f.orders.mark_paid(&order.id, OrderPayment::from_provider("pi_1".to_string(), 3000, 0)).unwrap();

    // Partial fulfillment is enough once paid.
    let updated = f.processor.fulfill_order(&order.id, &[line(&order, 2)], None, None, None).unwrap();
    assert_eq!(updated.payment_status, PaymentStatus::Paid);
    assert_eq!(updated.fulfillment_status, FulfillmentStatus::Partial);
    assert_eq!(updated.status, OrderStatus::Completed);
}

#[test]
fn over_fulfillment_rejects_the_whole_call() {
    let (f, order) = fixture_with_order(10, 3);
    f.processor.fulfill_order(&order.id, &[line(&order, 2)], None, None, None).unwrap();

    // 2 already fulfilled; 2 more would exceed the ordered 3.
    let result = f.processor.fulfill_order(&order.id, &[line(&order, 2)], None, None, None);
    assert!(matches!(result, Err(CommerceError::ValidationError(_))));

    let unchanged = f.orders.get_order(&order.id).unwrap();
    assert_eq!(unchanged.items[0].fulfilled_quantity, 2);
    assert_eq!(unchanged.fulfillments.len(), 1);
}

#[test]
fn duplicate_lines_are_validated_cumulatively() {
    let (f, order) = fixture_with_order(10, 3);

    // 2 + 2 of the same item exceeds the ordered 3 even though each
    // mention alone would pass.
    let result = f.processor.fulfill_order(
        &order.id,
        &[line(&order, 2), line(&order, 2)],
        None,
        None,
        None,
    );
    assert!(matches!(result, Err(CommerceError::ValidationError(_))));
    assert_eq!(f.orders.get_order(&order.id).unwrap().items[0].fulfilled_quantity, 0);
}

#[test]
fn unknown_line_item_rejects_the_whole_call() {
    let (f, order) = fixture_with_order(10, 3);

    let result = f.processor.fulfill_order(
        &order.id,
        &[
            line(&order, 1),
            FulfillmentRequestLine { order_item_id: "oi_missing".to_string(), quantity: 1 },
        ],
        None,
        None,
        None,
    );
    assert!(matches!(result, Err(CommerceError::ValidationError(_))));
    assert_eq!(f.orders.get_order(&order.id).unwrap().items[0].fulfilled_quantity, 0);
}

#[test]
fn extreme_quantities_are_rejected_not_wrapped() {
    let (f, order) = fixture_with_order(10, 3);
    f.processor.fulfill_order(&order.id, &[line(&order, 1)], None, None, None).unwrap();

    // A single absurd quantity fails validation cleanly.
    let result = f.processor.fulfill_order(&order.id, &[line(&order, u32::MAX)], None, None, None);
    assert!(matches!(result, Err(CommerceError::ValidationError(_))));

    // So does a duplicate pair whose sum would not fit in the counter.
    let result = f.processor.fulfill_order(
        &order.id,
        &[line(&order, u32::MAX), line(&order, u32::MAX)],
        None,
        None,
        None,
    );
    assert!(matches!(result, Err(CommerceError::ValidationError(_))));

    let unchanged = f.orders.get_order(&order.id).unwrap();
    assert_eq!(unchanged.items[0].fulfilled_quantity, 1);
    assert_eq!(unchanged.fulfillments.len(), 1);
}

#[test]
fn hold_blocks_fulfillment_until_lifted() {
    let (f, order) = fixture_with_order(10, 3);
    f.orders.set_workflow_status(&order.id, WorkflowStatus::OnHold, None).unwrap();

    let blocked = f.processor.fulfill_order(&order.id, &[line(&order, 1)], None, None, None);
    assert!(matches!(blocked, Err(CommerceError::Conflict(_))));

    f.orders.set_workflow_status(&order.id, WorkflowStatus::Normal, None).unwrap();
    assert!(f.processor.fulfill_order(&order.id, &[line(&order, 1)], None, None, None).is_ok());
}

#[test]
fn canceled_orders_cannot_be_fulfilled() {
    let (f, order) = fixture_with_order(10, 3);
    f.orders.cancel_order(&order.id, true, &f.inventory).unwrap();

    let result = f.processor.fulfill_order(&order.id, &[line(&order, 1)], None, None, None);
    assert!(matches!(result, Err(CommerceError::Conflict(_))));
}

#[test]
fn empty_and_zero_quantity_requests_are_rejected() {
    let (f, order) = fixture_with_order(10, 3);

    assert!(matches!(
        f.processor.fulfill_order(&order.id, &[], None, None, None),
        Err(CommerceError::ValidationError(_))
    ));
    assert!(matches!(
        f.processor.fulfill_order(&order.id, &[line(&order, 0)], None, None, None),
        Err(CommerceError::ValidationError(_))
    ));
}
