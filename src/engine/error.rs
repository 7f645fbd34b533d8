// ==========================================
// 船舶燃油核算系统 - 引擎层错误类型
// ==========================================
// 库存不足不是错误（记录为警告，运行继续）
// 并发冲突/持久化失败终止整个调用，不留部分结果
// ==========================================

use crate::domain::FailureKind;
use crate::engine::value_calculator::ValuationError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AllocationError {
    #[error("分摊或对账正在进行中，请稍后重试")]
    Busy,

    #[error("账本读写失败: {0}")]
    Persistence(#[from] RepositoryError),

    #[error("计价失败: {0}")]
    Valuation(#[from] ValuationError),
}

impl AllocationError {
    /// 面向调用方的错误分类
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            AllocationError::Busy => FailureKind::ConcurrencyConflict,
            AllocationError::Persistence(_) | AllocationError::Valuation(_) => {
                FailureKind::PersistenceFailure
            }
        }
    }
}

pub type AllocationResult<T> = Result<T, AllocationError>;
