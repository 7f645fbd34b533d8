// ==========================================
// 账本审计（纯函数，不触碰存储）
// ==========================================
// 检查项:
// - 孤儿分摊: 引用不存在的批次或消耗
// - 批次余量漂移: 采购量 − Σ分摊 ≠ 存储余量
// - 批次容量越界: 余量 < 0 或 > 采购量
// - 消耗超额分摊: Σ分摊 > 消耗量 + 容差
// - 分摊金额漂移: |分摊金额 − 单价 × 数量| > 金额容差
// 孤儿分摊不计入批次/消耗合计
// ==========================================

use crate::config::AllocationConfig;
use crate::domain::{
    Allocation, ConsumptionRecord, Finding, FindingKind, InconsistencyReport, LotRemainingUpdate,
    PurchaseLot,
};
use crate::engine::value_calculator::ValueCalculator;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};

/// 审计所需的账本快照
#[derive(Debug, Clone, Default)]
pub struct LedgerSnapshot {
    pub lots: Vec<PurchaseLot>,
    pub consumption: Vec<ConsumptionRecord>,
    pub allocations: Vec<Allocation>,
}

/// 审计账本，生成不一致报告
pub fn audit_ledger(
    snapshot: &LedgerSnapshot,
    config: &AllocationConfig,
    calculator: &ValueCalculator,
) -> InconsistencyReport {
    let lots: HashMap<&str, &PurchaseLot> =
        snapshot.lots.iter().map(|l| (l.id.as_str(), l)).collect();
    let consumption_ids: HashSet<&str> =
        snapshot.consumption.iter().map(|c| c.id.as_str()).collect();

    let mut findings = Vec::new();
    let mut by_lot: HashMap<&str, Decimal> = HashMap::new();
    let mut by_consumption: HashMap<&str, Decimal> = HashMap::new();
    let mut value_findings = Vec::new();

    // ===== 孤儿分摊 =====
    let mut orphans: Vec<&Allocation> = Vec::new();
    for a in &snapshot.allocations {
        let lot = lots.get(a.purchase_lot_id.as_str());
        let has_consumption = consumption_ids.contains(a.consumption_id.as_str());

        let lot = match (lot, has_consumption) {
            (Some(lot), true) => *lot,
            _ => {
                orphans.push(a);
                continue;
            }
        };

        *by_lot.entry(lot.id.as_str()).or_insert(Decimal::ZERO) += a.allocated_quantity;
        *by_consumption
            .entry(a.consumption_id.as_str())
            .or_insert(Decimal::ZERO) += a.allocated_quantity;

        if let Ok(expected) = calculator.allocated_value(lot, a.allocated_quantity) {
            if (a.allocated_value_usd - expected).abs() > config.value_tolerance_usd {
                value_findings.push(Finding {
                    kind: FindingKind::AllocationValueDrift,
                    entity_id: a.id.clone(),
                    observed: Some(a.allocated_value_usd),
                    expected: Some(expected),
                    description: format!(
                        "分摊 {} 金额 ${} 与批次 {} 单价推算值 ${} 不符",
                        a.id,
                        calculator.round_currency(a.allocated_value_usd),
                        lot.id,
                        calculator.round_currency(expected)
                    ),
                });
            }
        }
    }

    orphans.sort_by(|a, b| a.id.cmp(&b.id));
    for a in orphans {
        let missing = if lots.contains_key(a.purchase_lot_id.as_str()) {
            format!("消耗 {}", a.consumption_id)
        } else {
            format!("批次 {}", a.purchase_lot_id)
        };
        findings.push(Finding {
            kind: FindingKind::OrphanAllocation,
            entity_id: a.id.clone(),
            observed: Some(a.allocated_quantity),
            expected: None,
            description: format!("分摊 {} 引用了不存在的{}", a.id, missing),
        });
    }

    // ===== 批次余量 =====
    for lot in &snapshot.lots {
        let allocated = by_lot.get(lot.id.as_str()).copied().unwrap_or(Decimal::ZERO);
        let expected = lot.quantity_liters - allocated;

        if (lot.remaining_quantity - expected).abs() > config.quantity_tolerance_l {
            findings.push(Finding {
                kind: FindingKind::LotRemainingDrift,
                entity_id: lot.id.clone(),
                observed: Some(lot.remaining_quantity),
                expected: Some(expected),
                description: format!(
                    "批次 {} 剩余量 {} L, 按分摊记录应为 {} L",
                    lot.id,
                    lot.remaining_quantity.normalize(),
                    expected.normalize()
                ),
            });
        }

        if !lot.is_within_capacity() {
            findings.push(Finding {
                kind: FindingKind::LotCapacityViolation,
                entity_id: lot.id.clone(),
                observed: Some(lot.remaining_quantity),
                expected: Some(lot.quantity_liters),
                description: format!(
                    "批次 {} 剩余量 {} L 超出 [0, {}] L",
                    lot.id,
                    lot.remaining_quantity.normalize(),
                    lot.quantity_liters.normalize()
                ),
            });
        }
    }

    // ===== 消耗超额分摊 =====
    for record in &snapshot.consumption {
        let allocated = by_consumption
            .get(record.id.as_str())
            .copied()
            .unwrap_or(Decimal::ZERO);
        if allocated > record.consumption_liters + config.quantity_tolerance_l {
            findings.push(Finding {
                kind: FindingKind::OverAllocation,
                entity_id: record.id.clone(),
                observed: Some(allocated),
                expected: Some(record.consumption_liters),
                description: format!(
                    "消耗 {} 已分摊 {} L, 超过消耗量 {} L",
                    record.id,
                    allocated.normalize(),
                    record.consumption_liters.normalize()
                ),
            });
        }
    }

    findings.extend(value_findings);

    InconsistencyReport {
        findings,
        lots_checked: snapshot.lots.len(),
        consumptions_checked: snapshot.consumption.len(),
        allocations_checked: snapshot.allocations.len(),
    }
}

// ==========================================
// CleanupPlan - 定点清理计划
// ==========================================
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CleanupPlan {
    pub orphan_allocation_ids: Vec<String>,
    pub lot_fixes: Vec<LotRemainingUpdate>,
    /// 定点清理无法修复的问题（需全量重算）
    pub unresolved: Vec<String>,
}

impl CleanupPlan {
    pub fn is_empty(&self) -> bool {
        self.orphan_allocation_ids.is_empty() && self.lot_fixes.is_empty()
    }
}

/// 由报告推导定点清理计划
///
/// 只删孤儿分摊、只覆写可修复的余量漂移；其余问题列入 unresolved。
pub fn plan_cleanup(snapshot: &LedgerSnapshot, report: &InconsistencyReport) -> CleanupPlan {
    let lots: HashMap<&str, &PurchaseLot> =
        snapshot.lots.iter().map(|l| (l.id.as_str(), l)).collect();

    let mut plan = CleanupPlan::default();
    let mut fixed_lots: HashSet<&str> = HashSet::new();

    for finding in &report.findings {
        match finding.kind {
            FindingKind::OrphanAllocation => {
                plan.orphan_allocation_ids.push(finding.entity_id.clone());
            }
            FindingKind::LotRemainingDrift => {
                let lot = match lots.get(finding.entity_id.as_str()) {
                    Some(lot) => *lot,
                    None => continue,
                };
                match finding.expected {
                    Some(expected) if expected >= Decimal::ZERO && expected <= lot.quantity_liters => {
                        plan.lot_fixes.push(LotRemainingUpdate {
                            lot_id: lot.id.clone(),
                            remaining_quantity: expected,
                        });
                        fixed_lots.insert(lot.id.as_str());
                    }
                    _ => plan.unresolved.push(format!(
                        "{} (推算余量越界，需全量重算)",
                        finding.description
                    )),
                }
            }
            _ => {}
        }
    }

    // 第二遍: 越界/超额/金额问题，若未被余量修复覆盖则列为未解决
    for finding in &report.findings {
        match finding.kind {
            FindingKind::LotCapacityViolation if !fixed_lots.contains(finding.entity_id.as_str()) => {
                plan.unresolved
                    .push(format!("{} (需全量重算)", finding.description));
            }
            FindingKind::OverAllocation | FindingKind::AllocationValueDrift => {
                plan.unresolved
                    .push(format!("{} (需全量重算)", finding.description));
            }
            _ => {}
        }
    }

    plan
}
