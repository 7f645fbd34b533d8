// ==========================================
// 船舶燃油核算系统 - API 层
// ==========================================
// 职责: 提供业务 API 接口,供控制台入口及上层调用
// ==========================================

pub mod error;
pub mod fuel_allocation_api;

// 重导出核心类型
pub use error::{ApiError, ApiResult};
pub use fuel_allocation_api::FuelAllocationApi;
