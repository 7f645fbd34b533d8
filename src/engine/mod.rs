// ==========================================
// 船舶燃油核算系统 - 引擎层
// ==========================================
// 职责: FIFO 分摊、计价、对账恢复，不拼 SQL
// 红线: Engine 不拼 SQL, 所有问题必须输出可读原因
// ==========================================

pub mod allocation;
pub mod error;
pub mod reconciliation;
pub mod run_guard;
pub mod value_calculator;

// 重导出核心引擎
pub use allocation::AllocationEngine;
pub use error::{AllocationError, AllocationResult};
pub use reconciliation::ReconciliationService;
pub use run_guard::{RunGuard, RunPermit};
pub use value_calculator::{ValuationError, ValueCalculator};
