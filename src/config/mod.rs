// ==========================================
// 船舶燃油核算系统 - 配置层
// ==========================================
// 职责: 分摊/对账参数管理
// 存储: config_kv 表
// ==========================================

pub mod allocation_config;
pub mod config_manager;

// 重导出核心配置
pub use allocation_config::AllocationConfig;
pub use config_manager::{config_keys, ConfigManager};
