// ==========================================
// 船舶燃油核算系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 燃油库存 FIFO 分摊与账本对账
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 分摊与对账
pub mod engine;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// 应用层 - 装配
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    AllocationScope, FailureKind, FindingKind, RecoveryMode, RecoveryState, RunState,
};

// 领域实体
pub use domain::{
    Allocation, AllocationWarning, ConsumptionRecord, Finding, InconsistencyReport,
    MonthlyAllocationSummary, PurchaseLot, RecoveryResult, RunResult,
};

// 仓储
pub use repository::{LedgerStore, SqliteLedgerStore};

// 引擎
pub use engine::{AllocationEngine, ReconciliationService, ValueCalculator};

// API
pub use api::FuelAllocationApi;

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "船舶燃油核算系统";
