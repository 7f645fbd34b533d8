use super::AllocationEngine;
use crate::domain::{
    AllocationScope, AllocationWarning, ConsumptionRecord, FailureKind, PurchaseLot, RunState,
};
use crate::repository::SqliteLedgerStore;
use chrono::NaiveDate;
use rusqlite::Connection;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::{Arc, Mutex};

fn setup_store() -> Arc<SqliteLedgerStore> {
    crate::logging::init_test();
    let conn = Connection::open_in_memory().unwrap();
    crate::db::configure_sqlite_connection(&conn).unwrap();
    crate::db::init_schema(&conn).unwrap();
    Arc::new(SqliteLedgerStore::new(Arc::new(Mutex::new(conn))))
}

fn date(m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, m, d).unwrap()
}

fn seed_two_lots(store: &SqliteLedgerStore) {
    store
        .insert_lot(&PurchaseLot::new("L1", "V1", "S1", date(1, 1), dec!(3000), dec!(3000)))
        .unwrap();
    store
        .insert_lot(&PurchaseLot::new("L2", "V1", "S1", date(1, 2), dec!(2000), dec!(2200)))
        .unwrap();
}

fn engine_for(store: &Arc<SqliteLedgerStore>) -> AllocationEngine {
    AllocationEngine::with_default_config(store.clone())
}

fn remaining(store: &SqliteLedgerStore, lot_id: &str) -> Decimal {
    store.find_lot(lot_id).unwrap().unwrap().remaining_quantity
}

#[test]
fn test_fifo_split_across_two_lots() {
    let store = setup_store();
    seed_two_lots(&store);
    store
        .insert_consumption(&ConsumptionRecord::new("C1", "V1", date(1, 3), dec!(4000), 2))
        .unwrap();

    let engine = engine_for(&store);
    let result = engine.run(AllocationScope::Unallocated);

    assert!(result.success, "{}", result.message);
    assert_eq!(result.state, RunState::Completed);
    assert_eq!(result.processed_consumptions, 1);
    assert_eq!(result.allocations_created, 2);
    assert_eq!(result.total_allocated_quantity, dec!(4000));
    assert_eq!(result.total_allocated_value, dec!(4100.00));
    assert!(result.warnings.is_empty());

    let allocations = store.find_allocations_by_consumption("C1").unwrap();
    assert_eq!(allocations.len(), 2);
    let from_l1 = allocations.iter().find(|a| a.purchase_lot_id == "L1").unwrap();
    let from_l2 = allocations.iter().find(|a| a.purchase_lot_id == "L2").unwrap();
    assert_eq!(from_l1.allocated_quantity, dec!(3000));
    assert_eq!(from_l1.allocated_value_usd, dec!(3000));
    assert_eq!(from_l2.allocated_quantity, dec!(1000));
    assert_eq!(from_l2.allocated_value_usd, dec!(1100));

    assert_eq!(remaining(&store, "L1"), Decimal::ZERO);
    assert_eq!(remaining(&store, "L2"), dec!(1000));
    assert_eq!(engine.state(), RunState::Completed);
}

#[test]
fn test_consumptions_processed_in_date_order() {
    let store = setup_store();
    seed_two_lots(&store);
    // 乱序录入
    store
        .insert_consumption(&ConsumptionRecord::new("C2", "V1", date(1, 5), dec!(2000), 1))
        .unwrap();
    store
        .insert_consumption(&ConsumptionRecord::new("C1", "V1", date(1, 4), dec!(2000), 1))
        .unwrap();

    let result = engine_for(&store).run(AllocationScope::Unallocated);
    assert!(result.success);

    let c1 = store.find_allocations_by_consumption("C1").unwrap();
    assert_eq!(c1.len(), 1);
    assert_eq!(c1[0].purchase_lot_id, "L1");

    let c2 = store.find_allocations_by_consumption("C2").unwrap();
    assert_eq!(c2.len(), 2);
    let total: Decimal = c2.iter().map(|a| a.allocated_quantity).sum();
    assert_eq!(total, dec!(2000));
    assert!(c2.iter().any(|a| a.purchase_lot_id == "L1" && a.allocated_quantity == dec!(1000)));
    assert!(c2.iter().any(|a| a.purchase_lot_id == "L2" && a.allocated_quantity == dec!(1000)));
}

#[test]
fn test_shortfall_is_warning_not_failure() {
    let store = setup_store();
    seed_two_lots(&store);
    store
        .insert_consumption(&ConsumptionRecord::new("C1", "V1", date(1, 3), dec!(6000), 3))
        .unwrap();

    let result = engine_for(&store).run(AllocationScope::Unallocated);

    assert!(result.success);
    assert!(result.has_shortfall());
    assert_eq!(result.total_allocated_quantity, dec!(5000));
    match &result.warnings[0] {
        AllocationWarning::InsufficientInventory {
            consumption_id,
            shortfall,
            ..
        } => {
            assert_eq!(consumption_id, "C1");
            assert_eq!(*shortfall, dec!(1000));
        }
        other => panic!("unexpected warning: {:?}", other),
    }
    assert_eq!(remaining(&store, "L1"), Decimal::ZERO);
    assert_eq!(remaining(&store, "L2"), Decimal::ZERO);
}

#[test]
fn test_incremental_run_is_idempotent() {
    let store = setup_store();
    seed_two_lots(&store);
    store
        .insert_consumption(&ConsumptionRecord::new("C1", "V1", date(1, 3), dec!(4000), 2))
        .unwrap();

    let engine = engine_for(&store);
    let first = engine.run(AllocationScope::Unallocated);
    assert_eq!(first.allocations_created, 2);

    let second = engine.run(AllocationScope::Unallocated);
    assert!(second.success);
    assert_eq!(second.processed_consumptions, 0);
    assert_eq!(second.allocations_created, 0);
    assert_eq!(store.load_all_allocations().unwrap().len(), 2);
    assert_eq!(remaining(&store, "L2"), dec!(1000));
}

#[test]
fn test_incremental_run_completes_partial_consumption() {
    let store = setup_store();
    store
        .insert_lot(&PurchaseLot::new("L1", "V1", "S1", date(1, 1), dec!(1000), dec!(1000)))
        .unwrap();
    store
        .insert_consumption(&ConsumptionRecord::new("C1", "V1", date(1, 3), dec!(1500), 1))
        .unwrap();

    let engine = engine_for(&store);
    let first = engine.run(AllocationScope::Unallocated);
    assert!(first.has_shortfall());

    // 补录批次后，只补足缺口
    store
        .insert_lot(&PurchaseLot::new("L2", "V1", "S1", date(1, 2), dec!(1000), dec!(1200)))
        .unwrap();
    let second = engine.run(AllocationScope::Unallocated);
    assert!(second.success);
    assert!(!second.has_shortfall());
    assert_eq!(second.total_allocated_quantity, dec!(500));
    assert_eq!(remaining(&store, "L2"), dec!(500));
}

#[test]
fn test_full_scope_rebuilds_allocations() {
    let store = setup_store();
    seed_two_lots(&store);
    store
        .insert_consumption(&ConsumptionRecord::new("C1", "V1", date(1, 3), dec!(4000), 2))
        .unwrap();

    let engine = engine_for(&store);
    engine.run(AllocationScope::Unallocated);

    let full = engine.run(AllocationScope::All);
    assert!(full.success, "{}", full.message);
    assert_eq!(full.scope, AllocationScope::All);
    assert_eq!(full.allocations_deleted, 2);
    assert_eq!(full.allocations_created, 2);
    assert_eq!(store.load_all_allocations().unwrap().len(), 2);
    assert_eq!(remaining(&store, "L1"), Decimal::ZERO);
    assert_eq!(remaining(&store, "L2"), dec!(1000));
}

#[test]
fn test_lots_only_match_same_vessel() {
    let store = setup_store();
    store
        .insert_lot(&PurchaseLot::new("LA", "V2", "S1", date(1, 1), dec!(5000), dec!(5000)))
        .unwrap();
    store
        .insert_consumption(&ConsumptionRecord::new("C1", "V1", date(1, 3), dec!(100), 1))
        .unwrap();

    let result = engine_for(&store).run(AllocationScope::Unallocated);

    assert!(result.success);
    assert_eq!(result.allocations_created, 0);
    assert!(result.has_shortfall());
    assert_eq!(remaining(&store, "LA"), dec!(5000));
}

#[test]
fn test_allocation_month_taken_from_consumption() {
    let store = setup_store();
    store
        .insert_lot(&PurchaseLot::new("L1", "V1", "S1", date(1, 20), dec!(1000), dec!(900)))
        .unwrap();
    store
        .insert_consumption(&ConsumptionRecord::new("C1", "V1", date(2, 1), dec!(100), 1))
        .unwrap();

    engine_for(&store).run(AllocationScope::Unallocated);

    let allocations = store.find_allocations_by_consumption("C1").unwrap();
    assert_eq!(allocations.len(), 1);
    assert_eq!(allocations[0].month, "2024-02");
    assert_eq!(allocations[0].allocated_value_usd, dec!(90));
}

#[test]
fn test_busy_when_run_already_in_progress() {
    let store = setup_store();
    seed_two_lots(&store);
    store
        .insert_consumption(&ConsumptionRecord::new("C1", "V1", date(1, 3), dec!(4000), 2))
        .unwrap();

    let engine = engine_for(&store);
    let guard = engine.run_guard();
    let permit = guard.try_acquire().unwrap();

    let result = engine.run(AllocationScope::Unallocated);
    assert!(!result.success);
    assert_eq!(result.failure, Some(FailureKind::ConcurrencyConflict));
    assert!(store.load_all_allocations().unwrap().is_empty());
    assert_eq!(remaining(&store, "L1"), dec!(3000));

    drop(permit);
    assert!(engine.run(AllocationScope::Unallocated).success);
}

#[test]
fn test_zero_quantity_lot_skipped_with_warning() {
    let store = setup_store();
    store
        .insert_lot(&PurchaseLot::new("L0", "V1", "S1", date(1, 1), dec!(0), dec!(50)))
        .unwrap();
    store
        .insert_lot(&PurchaseLot::new("L1", "V1", "S1", date(1, 2), dec!(100), dec!(100)))
        .unwrap();
    store
        .insert_consumption(&ConsumptionRecord::new("C1", "V1", date(1, 3), dec!(50), 1))
        .unwrap();

    // 采购量为 0 的批次在全量模式下余量也为 0，需走全量路径才会进入工作集
    let result = engine_for(&store).run(AllocationScope::All);

    assert!(result.success);
    assert!(result
        .warnings
        .iter()
        .any(|w| matches!(w, AllocationWarning::IneligibleLot { lot_id, .. } if lot_id == "L0")));
    let allocations = store.find_allocations_by_consumption("C1").unwrap();
    assert_eq!(allocations.len(), 1);
    assert_eq!(allocations[0].purchase_lot_id, "L1");
}

#[test]
fn test_zero_quantity_lot_not_a_candidate_in_incremental_run() {
    let store = setup_store();
    store
        .insert_lot(&PurchaseLot::new("L0", "V1", "S1", date(1, 1), dec!(0), dec!(50)))
        .unwrap();
    store
        .insert_lot(&PurchaseLot::new("L1", "V1", "S1", date(1, 2), dec!(100), dec!(100)))
        .unwrap();
    store
        .insert_consumption(&ConsumptionRecord::new("C1", "V1", date(1, 3), dec!(50), 1))
        .unwrap();

    // 增量模式只加载余量 > 0 的批次，L0 不进入工作集，也不产生警告
    let result = engine_for(&store).run(AllocationScope::Unallocated);

    assert!(result.success);
    assert!(result.warnings.is_empty(), "{:?}", result.warnings);
    let allocations = store.find_allocations_by_consumption("C1").unwrap();
    assert_eq!(allocations.len(), 1);
    assert_eq!(allocations[0].purchase_lot_id, "L1");
    assert_eq!(remaining(&store, "L0"), Decimal::ZERO);
}
