use super::audit::{audit_ledger, plan_cleanup, LedgerSnapshot};
use crate::domain::{
    AllocationScope, FindingKind, InconsistencyReport, RecoveryMode, RecoveryResult,
    RecoveryState,
};
use crate::engine::allocation::AllocationEngine;
use crate::engine::error::{AllocationError, AllocationResult};
use crate::engine::run_guard::RunPermit;
use crate::repository::{CleanupOutcome, LedgerStore};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use tracing::instrument;

// ==========================================
// ReconciliationService - 对账与恢复
// ==========================================
// 与分摊引擎共享运行守卫: 恢复期间不允许分摊，反之亦然
pub struct ReconciliationService {
    store: Arc<dyn LedgerStore>,
    engine: Arc<AllocationEngine>,
    state: Mutex<RecoveryState>,
}

impl ReconciliationService {
    pub fn new(store: Arc<dyn LedgerStore>, engine: Arc<AllocationEngine>) -> Self {
        Self {
            store,
            engine,
            state: Mutex::new(RecoveryState::Idle),
        }
    }

    /// 当前恢复状态（终态保留到下一次恢复开始）
    pub fn state(&self) -> RecoveryState {
        self.state.lock().map(|s| *s).unwrap_or(RecoveryState::Failed)
    }

    fn transition(&self, next: RecoveryState) {
        if let Ok(mut state) = self.state.lock() {
            if !state.can_transition_to(next) {
                tracing::warn!(from = %*state, to = %next, "恢复状态迁移不合法");
            }
            *state = next;
        }
    }

    // ==========================================
    // 报告
    // ==========================================

    /// 生成不一致报告（只读，不改变恢复状态）
    #[instrument(skip(self))]
    pub fn get_inconsistency_report(&self) -> AllocationResult<InconsistencyReport> {
        let snapshot = self.load_snapshot()?;
        let report = self.audit(&snapshot);
        log_report(&report);
        Ok(report)
    }

    // ==========================================
    // 恢复
    // ==========================================

    /// 全量重算: 删除全部分摊、重置全部批次、按 All 范围重新分摊（单事务）
    pub fn rerun_full_allocation(&self) -> RecoveryResult {
        self.recover(RecoveryMode::FullRerun)
    }

    /// 定点清理: 只删孤儿分摊、只覆写漂移余量（单事务）
    pub fn manual_cleanup_inconsistent_data(&self) -> RecoveryResult {
        self.recover(RecoveryMode::ManualCleanup)
    }

    /// 按模式执行恢复，始终返回结果对象
    pub fn recover(&self, mode: RecoveryMode) -> RecoveryResult {
        match self.try_recover(mode) {
            Ok(result) => result,
            Err(e) => {
                let details = match &e {
                    AllocationError::Busy => vec!["已有分摊/对账在运行，本次调用未触碰数据".to_string()],
                    _ => vec!["恢复已整体回滚，账本保持恢复前状态".to_string()],
                };
                RecoveryResult::failed(mode, e.failure_kind(), e.to_string(), details)
            }
        }
    }

    /// 按模式执行恢复（类型化错误）
    #[instrument(skip_all, fields(mode = %mode))]
    pub fn try_recover(&self, mode: RecoveryMode) -> AllocationResult<RecoveryResult> {
        let guard = self.engine.run_guard();
        let permit = guard.try_acquire().ok_or_else(|| {
            tracing::warn!("恢复被拒绝: 已有运行进行中");
            AllocationError::Busy
        })?;

        // 上一轮终态 → Idle
        if self.state() != RecoveryState::Idle {
            self.transition(RecoveryState::Idle);
        }

        let outcome = self.recover_with_permit(mode, &permit);
        match &outcome {
            Ok(result) => self.transition(result.state),
            Err(e) => {
                tracing::error!(error = %e, "恢复失败");
                self.transition(RecoveryState::Failed);
            }
        }
        outcome
    }

    fn recover_with_permit(
        &self,
        mode: RecoveryMode,
        permit: &RunPermit<'_>,
    ) -> AllocationResult<RecoveryResult> {
        let snapshot = self.load_snapshot()?;
        let report = self.audit(&snapshot);
        log_report(&report);
        self.transition(RecoveryState::ReportGenerated);

        match mode {
            RecoveryMode::FullRerun => self.full_rerun(&report, permit),
            RecoveryMode::ManualCleanup => self.manual_cleanup(&snapshot, &report),
        }
    }

    fn full_rerun(
        &self,
        report: &InconsistencyReport,
        permit: &RunPermit<'_>,
    ) -> AllocationResult<RecoveryResult> {
        let run = self.engine.run_with_permit(AllocationScope::All, permit)?;

        // 全量重算覆盖全部批次，报告中的批次问题均被修复
        let lots_fixed = report
            .findings
            .iter()
            .filter(|f| {
                matches!(
                    f.kind,
                    FindingKind::LotRemainingDrift | FindingKind::LotCapacityViolation
                )
            })
            .map(|f| f.entity_id.as_str())
            .collect::<BTreeSet<_>>()
            .len();

        let mut details = vec![format!(
            "重算前不一致项 {} 条",
            report.findings.len()
        )];
        details.extend(run.details);

        // 替换已提交，复核读取失败只记警告
        match self.load_snapshot() {
            Ok(snapshot) => {
                let after = self.audit(&snapshot);
                if after.is_consistent() {
                    details.push("重算后账本一致".to_string());
                } else {
                    details.push(format!("重算后仍有 {} 条不一致", after.findings.len()));
                    details.extend(after.descriptions());
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "重算已提交，复核读取失败");
                details.push(format!("重算后校验读取失败: {}", e));
            }
        }

        let message = format!(
            "全量重算完成: 删除分摊 {} 条, 新建分摊 {} 条",
            run.allocations_deleted, run.allocations_created
        );
        tracing::info!(
            deleted = run.allocations_deleted,
            created = run.allocations_created,
            lots_fixed,
            "全量重算已提交"
        );

        Ok(RecoveryResult {
            success: true,
            message,
            details,
            mode: RecoveryMode::FullRerun,
            state: RecoveryState::FullRerunCommitted,
            failure: None,
            findings_before: report.findings.len(),
            allocations_deleted: run.allocations_deleted,
            allocations_created: run.allocations_created,
            lots_fixed,
        })
    }

    fn manual_cleanup(
        &self,
        snapshot: &LedgerSnapshot,
        report: &InconsistencyReport,
    ) -> AllocationResult<RecoveryResult> {
        let plan = plan_cleanup(snapshot, report);
        let mut details = vec![format!("清理前不一致项 {} 条", report.findings.len())];

        let outcome = if plan.is_empty() {
            details.push("无可定点修复的数据".to_string());
            CleanupOutcome::default()
        } else {
            let outcome = self
                .store
                .apply_manual_cleanup(&plan.orphan_allocation_ids, &plan.lot_fixes)?;
            for id in &plan.orphan_allocation_ids {
                details.push(format!("删除孤儿分摊 {}", id));
            }
            for fix in &plan.lot_fixes {
                details.push(format!(
                    "批次 {} 剩余量修正为 {} L",
                    fix.lot_id,
                    fix.remaining_quantity.normalize()
                ));
            }
            outcome
        };

        for item in &plan.unresolved {
            tracing::warn!("{}", item);
            details.push(format!("未修复: {}", item));
        }

        let mut message = format!(
            "定点清理完成: 删除孤儿分摊 {} 条, 修正批次 {} 个",
            outcome.allocations_deleted, outcome.lots_fixed
        );
        if !plan.unresolved.is_empty() {
            message.push_str(&format!(", {} 项需全量重算", plan.unresolved.len()));
        }
        tracing::info!(
            deleted = outcome.allocations_deleted,
            lots_fixed = outcome.lots_fixed,
            unresolved = plan.unresolved.len(),
            "定点清理已提交"
        );

        Ok(RecoveryResult {
            success: true,
            message,
            details,
            mode: RecoveryMode::ManualCleanup,
            state: RecoveryState::ManualCleanupCommitted,
            failure: None,
            findings_before: report.findings.len(),
            allocations_deleted: outcome.allocations_deleted,
            allocations_created: 0,
            lots_fixed: outcome.lots_fixed,
        })
    }

    // ==========================================
    // 内部工具
    // ==========================================

    fn load_snapshot(&self) -> AllocationResult<LedgerSnapshot> {
        Ok(LedgerSnapshot {
            lots: self.store.load_all_lots()?,
            consumption: self.store.load_all_consumption()?,
            allocations: self.store.load_all_allocations()?,
        })
    }

    fn audit(&self, snapshot: &LedgerSnapshot) -> InconsistencyReport {
        audit_ledger(snapshot, self.engine.config(), self.engine.calculator())
    }
}

fn log_report(report: &InconsistencyReport) {
    if report.is_consistent() {
        tracing::info!(
            lots = report.lots_checked,
            consumptions = report.consumptions_checked,
            allocations = report.allocations_checked,
            "账本一致"
        );
    } else {
        for finding in &report.findings {
            tracing::warn!(kind = %finding.kind, entity_id = %finding.entity_id, "{}", finding.description);
        }
    }
}
