// ==========================================
// 船舶燃油核算系统 - 账本存储接口
// ==========================================
// 职责: 批次/消耗/分摊的读写接口（不包含实现）
// 红线: Repository 不含业务逻辑, 只做数据映射
// 红线: 所有写入接口必须原子（全部成功或全部回滚）
// ==========================================

use crate::domain::{Allocation, AllocationScope, ConsumptionRecord, LotRemainingUpdate, PurchaseLot};
use crate::repository::error::RepositoryResult;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 全量替换分摊的写入统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplaceOutcome {
    pub allocations_deleted: usize,
    pub lots_reset: usize,
    pub allocations_inserted: usize,
    pub lots_updated: usize,
}

/// 定点清理的写入统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupOutcome {
    pub allocations_deleted: usize,
    pub lots_fixed: usize,
}

// ==========================================
// LedgerStore Trait
// ==========================================
// 实现者: SqliteLedgerStore
pub trait LedgerStore: Send + Sync {
    // ===== 上游录入 =====

    /// 录入采购批次
    fn insert_lot(&self, lot: &PurchaseLot) -> RepositoryResult<()>;

    /// 录入消耗记录
    fn insert_consumption(&self, record: &ConsumptionRecord) -> RepositoryResult<()>;

    // ===== 有序查询 =====

    /// 加载范围内的消耗记录
    ///
    /// # 排序
    /// - (vessel_id, consumption_date, id) 升序
    ///
    /// # 范围
    /// - Unallocated: 已分摊合计 < consumption_liters 的记录
    /// - All: 全部记录
    fn load_consumption(&self, scope: AllocationScope) -> RepositoryResult<Vec<ConsumptionRecord>>;

    /// 加载全部消耗记录（对账用）
    fn load_all_consumption(&self) -> RepositoryResult<Vec<ConsumptionRecord>> {
        self.load_consumption(AllocationScope::All)
    }

    /// 加载船舶的可用批次 (remaining_quantity > 0)
    ///
    /// # 排序
    /// - (purchase_date, id) 升序（FIFO 顺序）
    fn load_lots_for_vessel(&self, vessel_id: &str) -> RepositoryResult<Vec<PurchaseLot>>;

    /// 加载全部批次，按 (vessel_id, purchase_date, id) 升序
    fn load_all_lots(&self) -> RepositoryResult<Vec<PurchaseLot>>;

    /// 加载全部分摊记录，按 (created_date, id) 升序
    fn load_all_allocations(&self) -> RepositoryResult<Vec<Allocation>>;

    /// 每条消耗的已分摊合计 (consumption_id → Σ allocated_quantity)
    fn allocated_by_consumption(&self) -> RepositoryResult<HashMap<String, Decimal>>;

    // ===== 原子写入 =====

    /// 一次性提交分摊记录与批次余量
    fn persist_allocation_batch(
        &self,
        allocations: &[Allocation],
        lot_updates: &[LotRemainingUpdate],
    ) -> RepositoryResult<usize>;

    /// 全量替换: 删除全部分摊 + 重置全部批次余量 + 写入新分摊与余量（单事务）
    fn replace_all_allocations(
        &self,
        allocations: &[Allocation],
        lot_updates: &[LotRemainingUpdate],
    ) -> RepositoryResult<ReplaceOutcome>;

    /// 删除全部分摊记录
    fn delete_all_allocations(&self) -> RepositoryResult<usize>;

    /// 全部批次余量重置为采购量
    fn reset_all_lot_remaining(&self) -> RepositoryResult<usize>;

    /// 删除引用不存在批次/消耗的分摊记录
    fn delete_orphan_allocations(&self) -> RepositoryResult<usize>;

    /// 覆写单个批次余量
    fn fix_lot_remaining(&self, lot_id: &str, value: Decimal) -> RepositoryResult<()>;

    /// 定点清理: 删除指定孤儿分摊 + 覆写漂移余量（单事务）
    fn apply_manual_cleanup(
        &self,
        orphan_allocation_ids: &[String],
        lot_fixes: &[LotRemainingUpdate],
    ) -> RepositoryResult<CleanupOutcome>;
}
