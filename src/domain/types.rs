// ==========================================
// 船舶燃油核算系统 - 领域类型定义
// ==========================================
// 职责: 分摊范围、恢复模式、状态机、失败类型
// 序列化格式: SCREAMING_SNAKE_CASE
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 分摊范围 (Allocation Scope)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AllocationScope {
    Unallocated, // 增量: 仅处理未分摊完的消耗
    All,         // 全量: 重算全部消耗（对账重跑使用）
}

impl AllocationScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            AllocationScope::Unallocated => "UNALLOCATED",
            AllocationScope::All => "ALL",
        }
    }
}

impl fmt::Display for AllocationScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 恢复模式 (Recovery Mode)
// ==========================================
// 替代界面上的 是/否/取消 对话框分支
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecoveryMode {
    FullRerun,     // 全量重算（破坏性、确定性）
    ManualCleanup, // 定点清理（非破坏性）
}

impl RecoveryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecoveryMode::FullRerun => "FULL_RERUN",
            RecoveryMode::ManualCleanup => "MANUAL_CLEANUP",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "FULL_RERUN" | "FULL" => Some(RecoveryMode::FullRerun),
            "MANUAL_CLEANUP" | "CLEANUP" => Some(RecoveryMode::ManualCleanup),
            _ => None,
        }
    }
}

impl fmt::Display for RecoveryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 分摊运行状态机
// ==========================================
// Idle → Running → {Completed | Failed}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Idle => write!(f, "IDLE"),
            RunState::Running => write!(f, "RUNNING"),
            RunState::Completed => write!(f, "COMPLETED"),
            RunState::Failed => write!(f, "FAILED"),
        }
    }
}

// ==========================================
// 对账恢复状态机
// ==========================================
// Idle → ReportGenerated → {FullRerunCommitted | ManualCleanupCommitted | Failed} → Idle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecoveryState {
    Idle,
    ReportGenerated,
    FullRerunCommitted,
    ManualCleanupCommitted,
    Failed,
}

impl RecoveryState {
    /// 合法迁移判定
    pub fn can_transition_to(&self, next: RecoveryState) -> bool {
        use RecoveryState::*;
        matches!(
            (self, next),
            (Idle, ReportGenerated)
                | (Idle, Failed)
                | (ReportGenerated, FullRerunCommitted)
                | (ReportGenerated, ManualCleanupCommitted)
                | (ReportGenerated, Failed)
                | (FullRerunCommitted, Idle)
                | (ManualCleanupCommitted, Idle)
                | (Failed, Idle)
        )
    }
}

impl fmt::Display for RecoveryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecoveryState::Idle => write!(f, "IDLE"),
            RecoveryState::ReportGenerated => write!(f, "REPORT_GENERATED"),
            RecoveryState::FullRerunCommitted => write!(f, "FULL_RERUN_COMMITTED"),
            RecoveryState::ManualCleanupCommitted => write!(f, "MANUAL_CLEANUP_COMMITTED"),
            RecoveryState::Failed => write!(f, "FAILED"),
        }
    }
}

// ==========================================
// 失败类型 (面向调用方的错误分类)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    ConcurrencyConflict, // 已有运行在进行中
    PersistenceFailure,  // 账本读写失败（整体回滚）
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::ConcurrencyConflict => write!(f, "CONCURRENCY_CONFLICT"),
            FailureKind::PersistenceFailure => write!(f, "PERSISTENCE_FAILURE"),
        }
    }
}

// ==========================================
// 对账发现类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FindingKind {
    LotRemainingDrift,     // 批次剩余量与分摊记录不一致
    LotCapacityViolation,  // 剩余量超出 [0, 采购量]
    OverAllocation,        // 消耗被超额分摊
    OrphanAllocation,      // 分摊引用了不存在的批次/消耗
    AllocationValueDrift,  // 分摊金额与批次单价 × 数量不符
}

impl fmt::Display for FindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FindingKind::LotRemainingDrift => write!(f, "LOT_REMAINING_DRIFT"),
            FindingKind::LotCapacityViolation => write!(f, "LOT_CAPACITY_VIOLATION"),
            FindingKind::OverAllocation => write!(f, "OVER_ALLOCATION"),
            FindingKind::OrphanAllocation => write!(f, "ORPHAN_ALLOCATION"),
            FindingKind::AllocationValueDrift => write!(f, "ALLOCATION_VALUE_DRIFT"),
        }
    }
}
