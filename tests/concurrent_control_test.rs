// ==========================================
// 并发控制测试
// ==========================================
// 职责: 验证分摊与恢复共享运行守卫，第二个调用立即失败且不触碰数据
// ==========================================

mod helpers;

use fuel_ledger::domain::{AllocationScope, FailureKind, RecoveryMode, RecoveryState};
use fuel_ledger::api::ApiError;
use helpers::test_data_builder::{day, ConsumptionBuilder, LotBuilder};
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::thread;
use test_helpers::create_test_app;

#[test]
fn test_run_rejected_while_another_run_holds_guard() {
    let (_tmp, state) = create_test_app();
    state
        .store
        .insert_lot(&LotBuilder::new("L1").liters(dec!(100)).value_usd(dec!(100)).build())
        .unwrap();
    state
        .store
        .insert_consumption(&ConsumptionBuilder::new("C1").on(day(1, 2)).liters(dec!(10)).build())
        .unwrap();

    let guard = state.allocation_engine.run_guard();
    let permit = guard.try_acquire().expect("guard should be free");

    // 另一线程发起分摊与恢复
    let api = Arc::clone(&state.fuel_allocation_api);
    let handle = thread::spawn(move || {
        let run = api.run_allocation(AllocationScope::Unallocated);
        let recover = api.recover(RecoveryMode::FullRerun);
        let typed = api.try_run_allocation(AllocationScope::All);
        (run, recover, typed)
    });
    let (run, recover, typed) = handle.join().unwrap();

    assert!(!run.success);
    assert_eq!(run.failure, Some(FailureKind::ConcurrencyConflict));
    assert!(!recover.success);
    assert_eq!(recover.failure, Some(FailureKind::ConcurrencyConflict));
    assert!(matches!(typed, Err(ApiError::Busy(_))));

    assert!(state.store.load_all_allocations().unwrap().is_empty());
    assert_eq!(state.reconciliation.state(), RecoveryState::Idle);

    drop(permit);
    let run = state.fuel_allocation_api.run_allocation(AllocationScope::Unallocated);
    assert!(run.success);
    assert_eq!(run.allocations_created, 1);
}

#[test]
fn test_guard_released_after_failed_run() {
    let (_tmp, state) = create_test_app();
    let guard = state.allocation_engine.run_guard();

    let result = state.fuel_allocation_api.recover(RecoveryMode::ManualCleanup);
    assert!(result.success);
    assert!(!guard.is_running());

    let result = state.fuel_allocation_api.run_allocation(AllocationScope::All);
    assert!(result.success);
    assert!(!guard.is_running());
}
