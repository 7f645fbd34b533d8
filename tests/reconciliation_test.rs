// ==========================================
// 对账与恢复集成测试
// ==========================================
// 职责: 验证不一致检测、定点清理与全量重算
// ==========================================

mod helpers;

use chrono::NaiveDate;
use fuel_ledger::db::open_sqlite_connection;
use fuel_ledger::domain::{
    Allocation, AllocationScope, FailureKind, FindingKind, RecoveryMode, RecoveryState,
};
use fuel_ledger::repository::LedgerStore;
use helpers::test_data_builder::{day, ConsumptionBuilder, LotBuilder};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use test_helpers::create_test_app;

fn seed_and_allocate(state: &fuel_ledger::app::AppState) {
    let store = state.store.as_ref();
    store
        .insert_lot(&LotBuilder::new("L1").purchased_on(day(1, 1)).liters(dec!(3000)).value_usd(dec!(3000)).build())
        .unwrap();
    store
        .insert_lot(&LotBuilder::new("L2").purchased_on(day(1, 2)).liters(dec!(2000)).value_usd(dec!(2200)).build())
        .unwrap();
    store
        .insert_consumption(&ConsumptionBuilder::new("C1").on(day(1, 3)).liters(dec!(4000)).build())
        .unwrap();
    assert!(state.fuel_allocation_api.run_allocation(AllocationScope::Unallocated).success);
}

fn orphan(id: &str, lot_id: &str, consumption_id: &str) -> Allocation {
    Allocation {
        id: id.to_string(),
        purchase_lot_id: lot_id.to_string(),
        consumption_id: consumption_id.to_string(),
        month: "2024-01".to_string(),
        allocated_quantity: dec!(25),
        allocated_value_usd: dec!(25),
        created_date: NaiveDate::from_ymd_opt(2024, 1, 31)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap(),
    }
}

/// 另开连接创建中止写入的触发器，模拟写入阶段故障
fn install_failing_trigger(db_path: &std::path::Path, name: &str, event: &str) {
    let conn = open_sqlite_connection(db_path.to_str().unwrap()).unwrap();
    conn.execute_batch(&format!(
        "CREATE TRIGGER {} {} BEGIN SELECT RAISE(ABORT, 'simulated write failure'); END;",
        name, event
    ))
    .unwrap();
}

fn ledger_fingerprint(store: &dyn LedgerStore) -> (Vec<String>, Vec<(String, Decimal)>) {
    let mut ids: Vec<String> = store.load_all_allocations().unwrap().into_iter().map(|a| a.id).collect();
    ids.sort();
    let remaining = store
        .load_all_lots()
        .unwrap()
        .into_iter()
        .map(|l| (l.id, l.remaining_quantity))
        .collect();
    (ids, remaining)
}

#[test]
fn test_clean_ledger_reports_no_findings() {
    let (_tmp, state) = create_test_app();
    seed_and_allocate(&state);

    let report = state.fuel_allocation_api.get_inconsistency_report().unwrap();
    assert!(report.is_consistent());
    assert_eq!(report.lots_checked, 2);
    assert_eq!(report.consumptions_checked, 1);
    assert_eq!(report.allocations_checked, 2);
}

#[test]
fn test_orphan_detection_and_targeted_cleanup() {
    let (_tmp, state) = create_test_app();
    seed_and_allocate(&state);
    let store = state.store.as_ref();

    let mut kept: Vec<String> = store.load_all_allocations().unwrap().into_iter().map(|a| a.id).collect();
    store
        .persist_allocation_batch(&[orphan("ORPHAN-1", "L-REMOVED", "C1")], &[])
        .unwrap();

    let report = state.fuel_allocation_api.get_inconsistency_report().unwrap();
    assert_eq!(report.findings.len(), 1);
    assert_eq!(report.findings[0].kind, FindingKind::OrphanAllocation);
    assert_eq!(report.findings[0].entity_id, "ORPHAN-1");
    assert!(report.findings[0].description.contains("L-REMOVED"));

    let result = state.fuel_allocation_api.recover(RecoveryMode::ManualCleanup);
    assert!(result.success, "{}", result.message);
    assert_eq!(result.mode, RecoveryMode::ManualCleanup);
    assert_eq!(result.state, RecoveryState::ManualCleanupCommitted);
    assert_eq!(result.allocations_deleted, 1);
    assert_eq!(result.lots_fixed, 0);

    let mut remaining: Vec<String> = store.load_all_allocations().unwrap().into_iter().map(|a| a.id).collect();
    kept.sort();
    remaining.sort();
    assert_eq!(remaining, kept);
}

#[test]
fn test_cleanup_reports_drift_it_cannot_fix() {
    let (_tmp, state) = create_test_app();
    seed_and_allocate(&state);
    let store = state.store.as_ref();

    // L2 采购 2000，分摊 1000；再写入超量分摊使推算余量为负
    store
        .insert_consumption(&ConsumptionBuilder::new("C2").on(day(1, 4)).liters(dec!(1500)).build())
        .unwrap();
    let mut extra = orphan("EXTRA", "L2", "C2");
    extra.allocated_quantity = dec!(1500);
    extra.allocated_value_usd = dec!(1650);
    store.persist_allocation_batch(&[extra], &[]).unwrap();

    let report = state.fuel_allocation_api.get_inconsistency_report().unwrap();
    assert_eq!(report.count_of(FindingKind::LotRemainingDrift), 1);

    let result = state.fuel_allocation_api.recover(RecoveryMode::ManualCleanup);
    assert!(result.success);
    assert_eq!(result.lots_fixed, 0);
    assert!(result.details.iter().any(|d| d.contains("需全量重算")));
    assert!(result.message.contains("需全量重算"));

    // 全量重算后一致
    let full = state.fuel_allocation_api.recover(RecoveryMode::FullRerun);
    assert!(full.success, "{}", full.message);
    assert_eq!(full.state, RecoveryState::FullRerunCommitted);
    assert!(state.fuel_allocation_api.get_inconsistency_report().unwrap().is_consistent());
}

#[test]
fn test_full_rerun_repairs_drift_and_orphans() {
    let (_tmp, state) = create_test_app();
    seed_and_allocate(&state);
    let store = state.store.as_ref();

    store
        .persist_allocation_batch(&[orphan("ORPHAN-2", "L1", "C-GONE")], &[])
        .unwrap();
    store.fix_lot_remaining("L1", dec!(500)).unwrap();

    let before = state.fuel_allocation_api.get_inconsistency_report().unwrap();
    assert_eq!(before.count_of(FindingKind::OrphanAllocation), 1);
    assert_eq!(before.count_of(FindingKind::LotRemainingDrift), 1);

    let result = state.reconciliation.rerun_full_allocation();
    assert!(result.success, "{}", result.message);
    assert_eq!(result.findings_before, 2);
    assert_eq!(result.allocations_deleted, 3);
    assert_eq!(result.allocations_created, 2);
    assert_eq!(state.reconciliation.state(), RecoveryState::FullRerunCommitted);

    let after = state.fuel_allocation_api.get_inconsistency_report().unwrap();
    assert!(after.is_consistent());

    let total: Decimal = store
        .load_all_allocations()
        .unwrap()
        .iter()
        .map(|a| a.allocated_value_usd)
        .sum();
    assert_eq!(total, dec!(4100));
}

#[test]
fn test_recover_by_name_rejects_unknown_mode() {
    let (_tmp, state) = create_test_app();
    assert!(state.fuel_allocation_api.recover_by_name("cancel").is_err());
    let result = state.fuel_allocation_api.recover_by_name("cleanup").unwrap();
    assert!(result.success);
}

#[test]
fn test_full_rerun_write_failure_leaves_ledger_untouched() {
    let (tmp, state) = create_test_app();
    seed_and_allocate(&state);
    let store = state.store.as_ref();
    store
        .persist_allocation_batch(&[orphan("ORPHAN-3", "L-REMOVED", "C1")], &[])
        .unwrap();
    store.fix_lot_remaining("L2", dec!(1500)).unwrap();
    let before = ledger_fingerprint(store);

    install_failing_trigger(tmp.path(), "fail_allocation_insert", "BEFORE INSERT ON fuel_allocation");

    let result = state.reconciliation.rerun_full_allocation();

    assert!(!result.success);
    assert_eq!(result.failure, Some(FailureKind::PersistenceFailure));
    assert_eq!(result.state, RecoveryState::Failed);
    assert!(result.message.contains("simulated write failure"));
    assert_eq!(state.reconciliation.state(), RecoveryState::Failed);
    assert_eq!(ledger_fingerprint(store), before);
}

#[test]
fn test_manual_cleanup_write_failure_leaves_ledger_untouched() {
    let (tmp, state) = create_test_app();
    seed_and_allocate(&state);
    let store = state.store.as_ref();
    store
        .persist_allocation_batch(&[orphan("ORPHAN-4", "L-REMOVED", "C1")], &[])
        .unwrap();
    // L2 应为 1000，漂移在可修复范围内
    store.fix_lot_remaining("L2", dec!(1500)).unwrap();
    let before = ledger_fingerprint(store);
    assert!(before.0.contains(&"ORPHAN-4".to_string()));

    install_failing_trigger(tmp.path(), "fail_lot_update", "BEFORE UPDATE ON purchase_lot");

    let result = state.reconciliation.manual_cleanup_inconsistent_data();

    assert!(!result.success);
    assert_eq!(result.failure, Some(FailureKind::PersistenceFailure));
    assert_eq!(result.state, RecoveryState::Failed);
    assert_eq!(result.allocations_deleted, 0);
    assert_eq!(ledger_fingerprint(store), before);

    let report = state.fuel_allocation_api.get_inconsistency_report().unwrap();
    assert_eq!(report.count_of(FindingKind::OrphanAllocation), 1);
    assert_eq!(report.count_of(FindingKind::LotRemainingDrift), 1);
}
