use super::matching::{match_record, LotWorkingSet};
use crate::config::AllocationConfig;
use crate::domain::{
    Allocation, AllocationScope, AllocationWarning, LotRemainingUpdate, PurchaseLot, RunResult,
    RunState,
};
use crate::engine::error::{AllocationError, AllocationResult};
use crate::engine::run_guard::{RunGuard, RunPermit};
use crate::engine::value_calculator::ValueCalculator;
use crate::repository::LedgerStore;
use chrono::{NaiveDateTime, Timelike, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::instrument;

// ==========================================
// AllocationPlan - 匹配阶段输出（尚未持久化）
// ==========================================
#[derive(Debug, Default)]
pub(crate) struct AllocationPlan {
    pub allocations: Vec<Allocation>,
    pub lot_updates: Vec<LotRemainingUpdate>,
    pub warnings: Vec<AllocationWarning>,
    pub details: Vec<String>,
    pub processed_consumptions: usize,
    pub total_quantity: Decimal,
    pub total_value: Decimal,
}

// ==========================================
// AllocationEngine - FIFO 分摊引擎
// ==========================================
pub struct AllocationEngine {
    store: Arc<dyn LedgerStore>,
    config: AllocationConfig,
    calculator: ValueCalculator,
    guard: Arc<RunGuard>,
    state: Mutex<RunState>,
}

impl AllocationEngine {
    /// 创建分摊引擎
    pub fn new(store: Arc<dyn LedgerStore>, config: AllocationConfig) -> Self {
        let calculator = ValueCalculator::new(config.currency_scale);
        Self {
            store,
            config,
            calculator,
            guard: Arc::new(RunGuard::new()),
            state: Mutex::new(RunState::Idle),
        }
    }

    /// 使用默认参数创建
    pub fn with_default_config(store: Arc<dyn LedgerStore>) -> Self {
        Self::new(store, AllocationConfig::default())
    }

    /// 运行守卫（与对账服务共享）
    pub fn run_guard(&self) -> Arc<RunGuard> {
        self.guard.clone()
    }

    pub fn config(&self) -> &AllocationConfig {
        &self.config
    }

    pub fn calculator(&self) -> &ValueCalculator {
        &self.calculator
    }

    /// 最近一次运行的状态
    pub fn state(&self) -> RunState {
        self.state.lock().map(|s| *s).unwrap_or(RunState::Failed)
    }

    fn set_state(&self, next: RunState) {
        if let Ok(mut state) = self.state.lock() {
            *state = next;
        }
    }

    // ==========================================
    // 对外接口
    // ==========================================

    /// 执行分摊，始终返回结果对象
    ///
    /// 失败时 success=false，message 为可读原因，且不保留任何部分结果。
    pub fn run(&self, scope: AllocationScope) -> RunResult {
        match self.try_run(scope) {
            Ok(result) => result,
            Err(e) => {
                let details = match &e {
                    AllocationError::Busy => vec!["已有分摊/对账在运行，本次调用未触碰数据".to_string()],
                    _ => vec!["本次分摊已整体回滚，未保留任何分摊结果".to_string()],
                };
                RunResult::failed(scope, e.failure_kind(), e.to_string(), details)
            }
        }
    }

    /// 执行分摊（类型化错误）
    pub fn try_run(&self, scope: AllocationScope) -> AllocationResult<RunResult> {
        let permit = self.guard.try_acquire().ok_or_else(|| {
            tracing::warn!(scope = %scope, "分摊被拒绝: 已有运行进行中");
            AllocationError::Busy
        })?;
        self.run_with_permit(scope, &permit)
    }

    /// 在已持有运行许可的前提下执行分摊（对账全量重算复用）
    #[instrument(skip_all, fields(scope = %scope))]
    pub(crate) fn run_with_permit(
        &self,
        scope: AllocationScope,
        _permit: &RunPermit<'_>,
    ) -> AllocationResult<RunResult> {
        self.set_state(RunState::Running);
        let outcome = self.execute(scope);
        self.set_state(match &outcome {
            Ok(_) => RunState::Completed,
            Err(_) => RunState::Failed,
        });
        outcome
    }

    // ==========================================
    // 内部流程: 匹配 → 一次性提交
    // ==========================================

    fn execute(&self, scope: AllocationScope) -> AllocationResult<RunResult> {
        let created_date = run_timestamp();
        let mut plan = self.plan(scope, created_date)?;

        let allocations_deleted = match self.commit(scope, &plan) {
            Ok(deleted) => deleted,
            Err(e) => {
                tracing::error!(error = %e, "分摊写入失败，整体回滚");
                return Err(e);
            }
        };

        let allocations_created = plan.allocations.len();
        let total_value = self.calculator.round_currency(plan.total_value);

        let mut message = format!(
            "分摊完成: 处理消耗 {} 条, 新增分摊 {} 条, 分摊数量 {} L, 分摊金额 ${}",
            plan.processed_consumptions,
            allocations_created,
            plan.total_quantity.normalize(),
            total_value
        );
        let shortfalls = plan
            .warnings
            .iter()
            .filter(|w| matches!(w, AllocationWarning::InsufficientInventory { .. }))
            .count();
        if shortfalls > 0 {
            message.push_str(&format!(" (库存不足 {} 条)", shortfalls));
        }
        if scope == AllocationScope::All {
            plan.details
                .push(format!("全量模式: 删除旧分摊 {} 条并重建", allocations_deleted));
        }
        plan.details.push(message.clone());

        tracing::info!(
            processed = plan.processed_consumptions,
            allocations = allocations_created,
            quantity = %plan.total_quantity,
            value = %total_value,
            shortfalls,
            "分摊完成"
        );

        Ok(RunResult {
            success: true,
            message,
            details: plan.details,
            scope,
            state: RunState::Completed,
            failure: None,
            processed_consumptions: plan.processed_consumptions,
            allocations_created,
            allocations_deleted,
            total_allocated_quantity: plan.total_quantity,
            total_allocated_value: total_value,
            warnings: plan.warnings,
        })
    }

    /// 匹配阶段: 读取消耗与批次，在内存工作集中完成 FIFO 分摊
    pub(crate) fn plan(
        &self,
        scope: AllocationScope,
        created_date: NaiveDateTime,
    ) -> AllocationResult<AllocationPlan> {
        let records = self.store.load_consumption(scope)?;
        let already_allocated: HashMap<String, Decimal> = match scope {
            AllocationScope::Unallocated => self.store.allocated_by_consumption()?,
            // 全量模式提交时整体替换，旧分摊不计
            AllocationScope::All => HashMap::new(),
        };
        let mut fleet_lots = match scope {
            AllocationScope::All => Some(group_full_lots(self.store.load_all_lots()?)),
            AllocationScope::Unallocated => None,
        };

        let mut plan = AllocationPlan::default();
        plan.details.push(format!(
            "开始分摊: 范围={}, 候选消耗 {} 条",
            scope,
            records.len()
        ));

        let mut current_vessel: Option<String> = None;
        let mut working_set: Option<LotWorkingSet> = None;

        for record in &records {
            // 船舶切换: 提交上一船工作集，建立新工作集
            if current_vessel.as_deref() != Some(record.vessel_id.as_str()) {
                if let Some(ws) = working_set.take() {
                    plan.lot_updates.extend(ws.updates());
                }

                let lots = match fleet_lots.as_mut() {
                    Some(map) => map.remove(&record.vessel_id).unwrap_or_default(),
                    None => self.store.load_lots_for_vessel(&record.vessel_id)?,
                };
                let (ws, warnings) = LotWorkingSet::new(lots, &self.calculator);
                for w in &warnings {
                    tracing::warn!(vessel_id = %record.vessel_id, "{}", w.describe());
                    plan.details.push(w.describe());
                }
                plan.warnings.extend(warnings);
                plan.details.push(format!(
                    "船舶 {}: 可用批次 {} 个, 可用量 {} L",
                    record.vessel_id,
                    ws.lot_count(),
                    ws.available().normalize()
                ));

                working_set = Some(ws);
                current_vessel = Some(record.vessel_id.clone());
            }

            let ws = match working_set.as_mut() {
                Some(ws) => ws,
                None => continue,
            };

            let done = already_allocated.get(&record.id).copied().unwrap_or(Decimal::ZERO);
            let outstanding = record.consumption_liters - done;
            if outstanding <= self.config.quantity_tolerance_l {
                continue;
            }

            let matched = match_record(record, outstanding, ws, &self.calculator, created_date)?;
            plan.processed_consumptions += 1;

            for a in &matched.allocations {
                plan.details.push(format!(
                    "消耗 {} ({}): 批次 {} 分摊 {} L, ${}",
                    record.id,
                    record.consumption_date,
                    a.purchase_lot_id,
                    a.allocated_quantity.normalize(),
                    self.calculator.round_currency(a.allocated_value_usd)
                ));
            }

            if matched.outstanding > self.config.quantity_tolerance_l {
                let warning = AllocationWarning::InsufficientInventory {
                    consumption_id: record.id.clone(),
                    vessel_id: record.vessel_id.clone(),
                    requested: outstanding,
                    allocated: matched.allocated_quantity,
                    shortfall: matched.outstanding,
                };
                tracing::warn!(
                    consumption_id = %record.id,
                    shortfall = %matched.outstanding,
                    "库存不足，消耗仅部分分摊"
                );
                plan.details.push(warning.describe());
                plan.warnings.push(warning);
            }

            plan.total_quantity += matched.allocated_quantity;
            plan.total_value += matched.allocated_value;
            plan.allocations.extend(matched.allocations);
        }

        if let Some(ws) = working_set.take() {
            plan.lot_updates.extend(ws.updates());
        }

        Ok(plan)
    }

    /// 写入阶段: 单事务提交；返回被替换（删除）的旧分摊条数
    fn commit(&self, scope: AllocationScope, plan: &AllocationPlan) -> AllocationResult<usize> {
        match scope {
            AllocationScope::Unallocated => {
                if plan.allocations.is_empty() && plan.lot_updates.is_empty() {
                    return Ok(0);
                }
                self.store
                    .persist_allocation_batch(&plan.allocations, &plan.lot_updates)?;
                Ok(0)
            }
            AllocationScope::All => {
                let outcome = self
                    .store
                    .replace_all_allocations(&plan.allocations, &plan.lot_updates)?;
                tracing::info!(
                    deleted = outcome.allocations_deleted,
                    lots_reset = outcome.lots_reset,
                    inserted = outcome.allocations_inserted,
                    "全量替换分摊已提交"
                );
                Ok(outcome.allocations_deleted)
            }
        }
    }
}

/// 全量模式: 按船分组，余量重置为采购量
fn group_full_lots(lots: Vec<PurchaseLot>) -> HashMap<String, Vec<PurchaseLot>> {
    let mut grouped: HashMap<String, Vec<PurchaseLot>> = HashMap::new();
    for mut lot in lots {
        lot.remaining_quantity = lot.quantity_liters;
        grouped.entry(lot.vessel_id.clone()).or_default().push(lot);
    }
    grouped
}

/// 运行时间戳（秒级，与存储格式一致）
fn run_timestamp() -> NaiveDateTime {
    let now = Utc::now().naive_utc();
    now.with_nanosecond(0).unwrap_or(now)
}
