// ============================================================================
// TESTS
// ============================================================================

use super::types::{InventoryLocation, LevelFilter, Page, StockLine, VariantId};
use super::InventoryService;
use crate::types::common::StoreId;

fn seeded_service(available: i64) -> (InventoryService, VariantId, super::LocationId) {
    let service = InventoryService::new();
    let store = StoreId::new("store-1");
    let location = InventoryLocation::new(store, "Main Warehouse", true);
    let location_id = location.id.clone();
    service.add_location(location).expect("add location");

    let variant = VariantId::new("var-001");
    service.upsert_item(variant.clone(), Some("SKU-001".to_string())).expect("item");
    service
        .set_available(&variant, &location_id, available, "Initial stock", None)
        .expect("seed stock");
    (service, variant, location_id)
}

#[test]
fn reserve_moves_available_to_committed() {
    let (service, variant, location) = seeded_service(100);

    service.reserve(&variant, &location, 30, "ord_1").expect("reserve");

    let level = service.level_for_variant(&variant, &location).expect("level");
    assert_eq!(level.available, 70);
    assert_eq!(level.committed, 30);
    assert_eq!(level.on_hand, 100);
}

#[test]
fn reserve_fails_on_insufficient_stock() {
    let (service, variant, location) = seeded_service(10);

    let result = service.reserve(&variant, &location, 50, "ord_1");
    assert!(result.is_err());

    // Nothing changed, and available never went negative.
    let level = service.level_for_variant(&variant, &location).expect("level");
    assert_eq!(level.available, 10);
    assert_eq!(level.committed, 0);
}

#[test]
fn reserve_at_zero_available_fails() {
    let (service, variant, location) = seeded_service(0);

    assert!(service.reserve(&variant, &location, 1, "ord_1").is_err());
    let level = service.level_for_variant(&variant, &location).expect("level");
    assert_eq!(level.available, 0);
}

#[test]
fn multi_line_reserve_is_all_or_nothing() {
    let (service, variant_a, location) = seeded_service(100);
    let variant_b = VariantId::new("var-002");
    service.upsert_item(variant_b.clone(), Some("SKU-002".to_string())).expect("item");
    service
        .set_available(&variant_b, &location, 1, "Initial stock", None)
        .expect("seed");

    let lines = vec![
        StockLine { variant_id: variant_a.clone(), location_id: location.clone(), quantity: 5 },
        StockLine { variant_id: variant_b.clone(), location_id: location.clone(), quantity: 3 },
    ];
    assert!(service.reserve_all(&lines, "ord_1").is_err());

    // The first line must not have been applied.
    let level_a = service.level_for_variant(&variant_a, &location).expect("level");
    assert_eq!(level_a.available, 100);
    assert_eq!(level_a.committed, 0);
}

#[test]
fn fulfill_decrements_committed_and_on_hand_only() {
    let (service, variant, location) = seeded_service(100);
    service.reserve(&variant, &location, 30, "ord_1").expect("reserve");

    service.fulfill(&variant, &location, 30, "ord_1").expect("fulfill");

    let level = service.level_for_variant(&variant, &location).expect("level");
    assert_eq!(level.available, 70);
    assert_eq!(level.committed, 0);
    assert_eq!(level.on_hand, 70);
    assert_eq!(level.shipped, 30);
}

#[test]
fn fulfill_beyond_committed_fails() {
    let (service, variant, location) = seeded_service(100);
    service.reserve(&variant, &location, 5, "ord_1").expect("reserve");

    assert!(service.fulfill(&variant, &location, 6, "ord_1").is_err());
}

#[test]
fn release_returns_stock_to_available() {
    let (service, variant, location) = seeded_service(100);
    service.reserve(&variant, &location, 40, "ord_1").expect("reserve");

    service
        .release(&variant, &location, 40, "Order canceled", "ord_1")
        .expect("release");

    let level = service.level_for_variant(&variant, &location).expect("level");
    assert_eq!(level.available, 100);
    assert_eq!(level.committed, 0);
    assert_eq!(level.on_hand, 100);
}

#[test]
fn manual_adjustment_records_delta() {
    let (service, variant, location) = seeded_service(100);

    service
        .set_available(&variant, &location, 80, "Cycle count", Some("admin".to_string()))
        .expect("adjust");

    let level = service.level_for_variant(&variant, &location).expect("level");
    assert_eq!(level.available, 80);
    assert_eq!(level.on_hand, 80);

    let item = service.item_for_variant(&variant).expect("item");
    let history = service.adjustment_history(&item.id, None).expect("history");
    // Seed + correction.
    assert_eq!(history.len(), 2);
    assert!(history.iter().any(|a| a.quantity == -20));
}

#[test]
fn counters_replay_from_ledger() {
    let (service, variant, location) = seeded_service(100);
    service.reserve(&variant, &location, 30, "ord_1").expect("reserve");
    service.fulfill(&variant, &location, 20, "ord_1").expect("fulfill");
    service.release(&variant, &location, 10, "Partial cancel", "ord_1").expect("release");
    service.restock(&variant, &location, 15, "PO receipt").expect("restock");

    let item = service.item_for_variant(&variant).expect("item");
    let replay = service.replay_counters(&item.id, &location).expect("replay");
    let level = service.level_for_variant(&variant, &location).expect("level");

    // Level started from all-zero counters, so replay equals the counters.
    assert_eq!(replay.available, level.available);
    assert_eq!(replay.committed, level.committed);
    assert_eq!(replay.on_hand, level.on_hand);
}

#[test]
fn steady_state_relationship_holds() {
    let (service, variant, location) = seeded_service(50);
    service.reserve(&variant, &location, 20, "ord_1").expect("reserve");
    service.fulfill(&variant, &location, 10, "ord_1").expect("fulfill");
    service.record_damage(&variant, &location, 3, "Forklift accident").expect("damage");

    let level = service.level_for_variant(&variant, &location).expect("level");
    assert_eq!(level.on_hand, level.available + level.committed);
}

#[test]
fn delete_level_cascades_to_item_and_variant() {
    let (service, variant, location) = seeded_service(10);
    let item = service.item_for_variant(&variant).expect("item");

    let outcome = service.delete_level(&item.id, &location).expect("delete");
    assert!(outcome.level_deleted);
    assert!(outcome.item_deleted);
    assert!(outcome.variant_deleted);

    assert!(service.item_for_variant(&variant).is_err());
    assert!(!service.variant_exists(&variant).expect("exists"));
}

#[test]
fn delete_level_keeps_item_with_remaining_levels() {
    let (service, variant, location_a) = seeded_service(10);
    let store = StoreId::new("store-1");
    let location_b = InventoryLocation::new(store, "Overflow", false);
    let location_b_id = location_b.id.clone();
    service.add_location(location_b).expect("add location");
    service
        .set_available(&variant, &location_b_id, 5, "Initial stock", None)
        .expect("seed");

    let item = service.item_for_variant(&variant).expect("item");
    let outcome = service.delete_level(&item.id, &location_a).expect("delete");
    assert!(outcome.level_deleted);
    assert!(!outcome.item_deleted);
    assert!(!outcome.variant_deleted);
    assert!(service.variant_exists(&variant).expect("exists"));
}

#[test]
fn list_levels_filters_by_search_and_location() {
    let (service, _variant, location) = seeded_service(10);
    let variant_b = VariantId::new("var-xyz");
    service.upsert_item(variant_b.clone(), Some("WIDGET-9".to_string())).expect("item");
    service
        .set_available(&variant_b, &location, 4, "Initial stock", None)
        .expect("seed");

    let filter = LevelFilter::new().location(location.clone()).search("widget");
    let rows = service.list_levels(&filter, Page::default()).expect("list");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].variant_id, variant_b);

    let all = service
        .list_levels(&LevelFilter::new().location(location), Page::default())
        .expect("list");
    assert_eq!(all.len(), 2);
}
