// ==========================================
// 船舶燃油核算系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、结果对象
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod allocation;
pub mod consumption;
pub mod lot;
pub mod reconciliation;
pub mod types;

// 重导出核心类型
pub use allocation::{Allocation, AllocationWarning, MonthlyAllocationSummary, RunResult};
pub use consumption::{month_of, ConsumptionRecord};
pub use lot::{LotRemainingUpdate, PurchaseLot};
pub use reconciliation::{Finding, InconsistencyReport, RecoveryResult};
pub use types::{
    AllocationScope, FailureKind, FindingKind, RecoveryMode, RecoveryState, RunState,
};
