// ==========================================
// 船舶燃油核算系统 - 燃油分摊 API
// ==========================================
// 职责: 上游录入、分摊运行、对账恢复、月度汇总
// 红线: 所有返回的金额汇总均在此边界舍入
// ==========================================

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::api::error::{ApiError, ApiResult};
use crate::domain::{
    AllocationScope, ConsumptionRecord, InconsistencyReport, MonthlyAllocationSummary,
    PurchaseLot, RecoveryMode, RecoveryResult, RunResult,
};
use crate::engine::{AllocationEngine, ReconciliationService, ValueCalculator};
use crate::repository::LedgerStore;

// ==========================================
// FuelAllocationApi
// ==========================================

/// 燃油分摊API
///
/// 职责：
/// 1. 批次/消耗录入（带校验）
/// 2. 触发 FIFO 分摊
/// 3. 不一致报告与恢复
/// 4. 按船/月汇总
pub struct FuelAllocationApi {
    store: Arc<dyn LedgerStore>,
    engine: Arc<AllocationEngine>,
    reconciliation: Arc<ReconciliationService>,
}

impl FuelAllocationApi {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        engine: Arc<AllocationEngine>,
        reconciliation: Arc<ReconciliationService>,
    ) -> Self {
        Self {
            store,
            engine,
            reconciliation,
        }
    }

    // ==========================================
    // 上游录入
    // ==========================================

    /// 录入采购批次
    pub fn record_purchase_lot(&self, lot: &PurchaseLot) -> ApiResult<()> {
        if lot.id.trim().is_empty() || lot.vessel_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("批次ID与船舶ID不能为空".to_string()));
        }
        if lot.quantity_liters < Decimal::ZERO || lot.total_value_usd < Decimal::ZERO {
            return Err(ApiError::ValidationError(format!(
                "批次 {} 采购量与金额不能为负",
                lot.id
            )));
        }
        if !lot.is_within_capacity() {
            return Err(ApiError::ValidationError(format!(
                "批次 {} 剩余量 {} 超出 [0, {}]",
                lot.id, lot.remaining_quantity, lot.quantity_liters
            )));
        }

        self.store.insert_lot(lot)?;
        debug!(lot_id = %lot.id, vessel_id = %lot.vessel_id, "批次已录入");
        Ok(())
    }

    /// 录入消耗记录
    pub fn record_consumption(&self, record: &ConsumptionRecord) -> ApiResult<()> {
        if record.id.trim().is_empty() || record.vessel_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("消耗ID与船舶ID不能为空".to_string()));
        }
        if record.consumption_liters < Decimal::ZERO {
            return Err(ApiError::ValidationError(format!(
                "消耗 {} 的消耗量不能为负",
                record.id
            )));
        }

        self.store.insert_consumption(record)?;
        debug!(consumption_id = %record.id, vessel_id = %record.vessel_id, "消耗已录入");
        Ok(())
    }

    // ==========================================
    // 分摊
    // ==========================================

    /// 执行分摊
    pub fn run_allocation(&self, scope: AllocationScope) -> RunResult {
        self.engine.run(scope)
    }

    /// 执行分摊（失败返回 ApiError）
    pub fn try_run_allocation(&self, scope: AllocationScope) -> ApiResult<RunResult> {
        Ok(self.engine.try_run(scope)?)
    }

    // ==========================================
    // 对账
    // ==========================================

    pub fn get_inconsistency_report(&self) -> ApiResult<InconsistencyReport> {
        Ok(self.reconciliation.get_inconsistency_report()?)
    }

    /// 按模式恢复
    pub fn recover(&self, mode: RecoveryMode) -> RecoveryResult {
        self.reconciliation.recover(mode)
    }

    /// 按模式名称恢复（"full" / "cleanup"）
    pub fn recover_by_name(&self, mode: &str) -> ApiResult<RecoveryResult> {
        let mode = RecoveryMode::parse(mode).ok_or_else(|| {
            ApiError::InvalidInput(format!("未知的恢复模式: {} (可选 full / cleanup)", mode))
        })?;
        Ok(self.reconciliation.recover(mode))
    }

    // ==========================================
    // 汇总
    // ==========================================

    /// 按 (船舶, 月份) 汇总分摊
    ///
    /// # 参数
    /// - month: 可选月份过滤 (YYYY-MM)
    ///
    /// # 返回
    /// - 按 (vessel_id, month) 升序的汇总列表；金额在此舍入
    pub fn monthly_summary(&self, month: Option<&str>) -> ApiResult<Vec<MonthlyAllocationSummary>> {
        let month = match month {
            Some(m) => Some(validate_month(m)?),
            None => None,
        };

        let allocations = self.store.load_all_allocations()?;
        let consumption_vessels: HashMap<String, String> = self
            .store
            .load_all_consumption()?
            .into_iter()
            .map(|c| (c.id, c.vessel_id))
            .collect();
        let lot_vessels: HashMap<String, String> = self
            .store
            .load_all_lots()?
            .into_iter()
            .map(|l| (l.id, l.vessel_id))
            .collect();

        // (vessel, month) → (条数, 数量, 金额)
        let mut groups: BTreeMap<(String, String), (usize, Decimal, Decimal)> = BTreeMap::new();
        let mut skipped = 0usize;

        for a in allocations {
            if let Some(m) = &month {
                if &a.month != m {
                    continue;
                }
            }
            let vessel = consumption_vessels
                .get(&a.consumption_id)
                .or_else(|| lot_vessels.get(&a.purchase_lot_id));
            let vessel = match vessel {
                Some(v) => v.clone(),
                None => {
                    skipped += 1;
                    continue;
                }
            };

            let entry = groups
                .entry((vessel, a.month.clone()))
                .or_insert((0, Decimal::ZERO, Decimal::ZERO));
            entry.0 += 1;
            entry.1 += a.allocated_quantity;
            entry.2 += a.allocated_value_usd;
        }

        if skipped > 0 {
            warn!(skipped, "汇总跳过无法定位船舶的孤儿分摊");
        }

        let calculator = self.engine.calculator();
        Ok(groups
            .into_iter()
            .map(|((vessel_id, month), (count, qty, value))| MonthlyAllocationSummary {
                vessel_id,
                month,
                allocation_count: count,
                total_quantity: qty,
                total_value_usd: calculator.round_currency(value),
                average_unit_cost: ValueCalculator::average_unit_cost(value, qty),
            })
            .collect())
    }
}

/// 校验月份格式 (YYYY-MM)
fn validate_month(month: &str) -> ApiResult<String> {
    let trimmed = month.trim();
    let valid = trimmed.len() == 7
        && NaiveDate::parse_from_str(&format!("{}-01", trimmed), "%Y-%m-%d").is_ok();
    if !valid {
        return Err(ApiError::InvalidInput(format!(
            "月份格式错误: {} (应为 YYYY-MM)",
            month
        )));
    }
    Ok(trimmed.to_string())
}
