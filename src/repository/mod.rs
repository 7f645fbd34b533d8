// ==========================================
// 船舶燃油核算系统 - 数据仓储层
// ==========================================
// 职责: 提供账本数据访问接口,屏蔽数据库细节
// 红线: Repository 不含业务逻辑
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod error;
pub mod ledger_store;
pub mod sqlite_ledger_store;

// 重导出核心仓储
pub use error::{RepositoryError, RepositoryResult};
pub use ledger_store::{CleanupOutcome, LedgerStore, ReplaceOutcome};
pub use sqlite_ledger_store::SqliteLedgerStore;
