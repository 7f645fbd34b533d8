// ==========================================
// 船舶燃油核算系统 - 对账发现与恢复结果
// ==========================================

use crate::domain::types::{FailureKind, FindingKind, RecoveryMode, RecoveryState};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ==========================================
// Finding - 单条不一致发现
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub kind: FindingKind,
    pub entity_id: String,          // 批次/消耗/分摊 ID
    pub observed: Option<Decimal>,
    pub expected: Option<Decimal>,
    pub description: String,
}

// ==========================================
// InconsistencyReport - 不一致报告
// ==========================================
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InconsistencyReport {
    pub findings: Vec<Finding>,
    pub lots_checked: usize,
    pub consumptions_checked: usize,
    pub allocations_checked: usize,
}

impl InconsistencyReport {
    pub fn is_consistent(&self) -> bool {
        self.findings.is_empty()
    }

    pub fn count_of(&self, kind: FindingKind) -> usize {
        self.findings.iter().filter(|f| f.kind == kind).count()
    }

    /// 面向用户的文本列表
    pub fn descriptions(&self) -> Vec<String> {
        self.findings.iter().map(|f| f.description.clone()).collect()
    }
}

// ==========================================
// RecoveryResult - 恢复操作结果
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryResult {
    pub success: bool,
    pub message: String,
    pub details: Vec<String>,
    pub mode: RecoveryMode,
    pub state: RecoveryState,
    pub failure: Option<FailureKind>,
    pub findings_before: usize,
    pub allocations_deleted: usize,
    pub allocations_created: usize,
    pub lots_fixed: usize,
}

impl RecoveryResult {
    pub fn failed(
        mode: RecoveryMode,
        failure: FailureKind,
        message: impl Into<String>,
        details: Vec<String>,
    ) -> Self {
        Self {
            success: false,
            message: message.into(),
            details,
            mode,
            state: RecoveryState::Failed,
            failure: Some(failure),
            findings_before: 0,
            allocations_deleted: 0,
            allocations_created: 0,
            lots_fixed: 0,
        }
    }
}
