// ==========================================
// 船舶燃油核算系统 - 对账与恢复
// ==========================================
// 职责: 审计账本不变量，提供全量重算 / 定点清理两种恢复方式
// 红线: 分摊运行从不自动纠错，修复只经由本模块
// ==========================================

pub mod audit;
mod service;


pub use audit::{audit_ledger, plan_cleanup, CleanupPlan, LedgerSnapshot};
pub use service::ReconciliationService;
