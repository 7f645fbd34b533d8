// ==========================================
// 船舶燃油核算系统 - 分摊记录与运行结果
// ==========================================
// 红线: 分摊记录只由分摊引擎产生，只由对账恢复删除/重写
// 红线: 分摊金额保持全精度，仅在汇总/报表边界舍入
// ==========================================

use crate::domain::types::{AllocationScope, FailureKind, RunState};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ==========================================
// Allocation - 分摊记录 (批次 × 消耗)
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    pub id: String,
    pub purchase_lot_id: String,
    pub consumption_id: String,
    pub month: String,                 // 取自消耗记录
    pub allocated_quantity: Decimal,
    pub allocated_value_usd: Decimal,  // 全精度
    pub created_date: NaiveDateTime,
}

// ==========================================
// AllocationWarning - 可恢复的逐条问题
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AllocationWarning {
    /// 库存不足，消耗仅部分分摊
    InsufficientInventory {
        consumption_id: String,
        vessel_id: String,
        requested: Decimal,
        allocated: Decimal,
        shortfall: Decimal,
    },
    /// 批次不可参与分摊（采购量为 0）
    IneligibleLot { lot_id: String, reason: String },
}

impl AllocationWarning {
    pub fn describe(&self) -> String {
        match self {
            AllocationWarning::InsufficientInventory {
                consumption_id,
                vessel_id,
                requested,
                allocated,
                shortfall,
            } => format!(
                "库存不足: 船舶 {} 消耗 {} 需求 {} L, 已分摊 {} L, 缺口 {} L",
                vessel_id,
                consumption_id,
                requested.normalize(),
                allocated.normalize(),
                shortfall.normalize()
            ),
            AllocationWarning::IneligibleLot { lot_id, reason } => {
                format!("批次 {} 不参与分摊: {}", lot_id, reason)
            }
        }
    }
}

// ==========================================
// RunResult - 分摊运行结果
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub success: bool,
    pub message: String,
    pub details: Vec<String>,              // 逐步日志（面向用户）
    pub scope: AllocationScope,
    pub state: RunState,
    pub failure: Option<FailureKind>,
    pub processed_consumptions: usize,
    pub allocations_created: usize,
    pub allocations_deleted: usize,        // 仅全量模式
    pub total_allocated_quantity: Decimal,
    pub total_allocated_value: Decimal,    // 已按币种精度舍入
    pub warnings: Vec<AllocationWarning>,
}

impl RunResult {
    /// 构造失败结果（不含任何分摊效果）
    pub fn failed(
        scope: AllocationScope,
        failure: FailureKind,
        message: impl Into<String>,
        details: Vec<String>,
    ) -> Self {
        Self {
            success: false,
            message: message.into(),
            details,
            scope,
            state: RunState::Failed,
            failure: Some(failure),
            processed_consumptions: 0,
            allocations_created: 0,
            allocations_deleted: 0,
            total_allocated_quantity: Decimal::ZERO,
            total_allocated_value: Decimal::ZERO,
            warnings: Vec::new(),
        }
    }

    pub fn has_shortfall(&self) -> bool {
        self.warnings
            .iter()
            .any(|w| matches!(w, AllocationWarning::InsufficientInventory { .. }))
    }
}

// ==========================================
// MonthlyAllocationSummary - 月度汇总（报表边界）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyAllocationSummary {
    pub vessel_id: String,
    pub month: String,
    pub allocation_count: usize,
    pub total_quantity: Decimal,
    pub total_value_usd: Decimal,          // 已舍入
    pub average_unit_cost: Option<Decimal>, // 加权平均单价（未舍入）
}
