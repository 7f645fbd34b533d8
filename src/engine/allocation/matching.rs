// ==========================================
// FIFO 匹配（纯内存，不触碰存储）
// ==========================================
// 工作集: lot_id → 剩余量，运行开始时建立，运行结束时一次性提交
// 顺序: 批次按 (purchase_date, id) 升序，先到先用
// ==========================================

use crate::domain::{Allocation, AllocationWarning, ConsumptionRecord, LotRemainingUpdate, PurchaseLot};
use crate::engine::value_calculator::{ValuationError, ValueCalculator};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;

// ==========================================
// LotWorkingSet - 单船批次工作集
// ==========================================
#[derive(Debug, Clone)]
pub struct LotWorkingSet {
    lots: Vec<PurchaseLot>,
    remaining: HashMap<String, Decimal>,
    head: usize,
    touched: BTreeSet<String>,
}

impl LotWorkingSet {
    /// 建立工作集
    ///
    /// 输入批次须已按 FIFO 顺序排列；不可参与分摊的批次被剔除并返回警告。
    pub fn new(lots: Vec<PurchaseLot>, calculator: &ValueCalculator) -> (Self, Vec<AllocationWarning>) {
        let mut warnings = Vec::new();
        let mut eligible = Vec::with_capacity(lots.len());

        for lot in lots {
            if let Err(e) = calculator.unit_cost(&lot) {
                warnings.push(AllocationWarning::IneligibleLot {
                    lot_id: lot.id.clone(),
                    reason: e.to_string(),
                });
                continue;
            }
            if !lot.is_within_capacity() {
                // 余量越界不在分摊中修正，留给对账
                warnings.push(AllocationWarning::IneligibleLot {
                    lot_id: lot.id.clone(),
                    reason: format!(
                        "剩余量 {} 超出 [0, {}]，需对账修复",
                        lot.remaining_quantity.normalize(),
                        lot.quantity_liters.normalize()
                    ),
                });
                continue;
            }
            if lot.remaining_quantity <= Decimal::ZERO {
                continue;
            }
            eligible.push(lot);
        }

        let remaining = eligible
            .iter()
            .map(|lot| (lot.id.clone(), lot.remaining_quantity))
            .collect();

        (
            Self {
                lots: eligible,
                remaining,
                head: 0,
                touched: BTreeSet::new(),
            },
            warnings,
        )
    }

    pub fn lot_count(&self) -> usize {
        self.lots.len()
    }

    /// 剩余可用总量
    pub fn available(&self) -> Decimal {
        self.lots[self.head.min(self.lots.len())..]
            .iter()
            .map(|lot| self.remaining_of(&lot.id))
            .sum()
    }

    pub fn remaining_of(&self, lot_id: &str) -> Decimal {
        self.remaining.get(lot_id).copied().unwrap_or(Decimal::ZERO)
    }

    /// 当前头部批次（跳过已耗尽的批次）
    fn head_lot(&mut self) -> Option<&PurchaseLot> {
        while self.head < self.lots.len() {
            let id = &self.lots[self.head].id;
            if self.remaining_of(id) > Decimal::ZERO {
                return self.lots.get(self.head);
            }
            self.head += 1;
        }
        None
    }

    fn consume(&mut self, lot_id: &str, quantity: Decimal) {
        if let Some(rem) = self.remaining.get_mut(lot_id) {
            *rem -= quantity;
        }
        self.touched.insert(lot_id.to_string());
    }

    /// 被改动批次的最终余量
    pub fn updates(&self) -> Vec<LotRemainingUpdate> {
        self.touched
            .iter()
            .map(|lot_id| LotRemainingUpdate {
                lot_id: lot_id.clone(),
                remaining_quantity: self.remaining_of(lot_id),
            })
            .collect()
    }
}

// ==========================================
// RecordMatch - 单条消耗的匹配结果
// ==========================================
#[derive(Debug, Clone)]
pub struct RecordMatch {
    pub allocations: Vec<Allocation>,
    pub allocated_quantity: Decimal,
    pub allocated_value: Decimal,
    /// 匹配后仍未覆盖的数量
    pub outstanding: Decimal,
}

/// 按 FIFO 为一条消耗分摊 `outstanding` 升
///
/// 每个被触及的批次生成一条分摊；批次耗尽后前进到下一批次。
pub fn match_record(
    record: &ConsumptionRecord,
    outstanding: Decimal,
    working_set: &mut LotWorkingSet,
    calculator: &ValueCalculator,
    created_date: NaiveDateTime,
) -> Result<RecordMatch, ValuationError> {
    let mut outstanding = outstanding;
    let mut allocations = Vec::new();
    let mut allocated_quantity = Decimal::ZERO;
    let mut allocated_value = Decimal::ZERO;

    while outstanding > Decimal::ZERO {
        let lot = match working_set.head_lot() {
            Some(lot) => lot.clone(),
            None => break,
        };

        let available = working_set.remaining_of(&lot.id);
        let quantity = available.min(outstanding);
        let value = calculator.allocated_value(&lot, quantity)?;

        allocations.push(Allocation {
            id: Uuid::new_v4().to_string(),
            purchase_lot_id: lot.id.clone(),
            consumption_id: record.id.clone(),
            month: record.month.clone(),
            allocated_quantity: quantity,
            allocated_value_usd: value,
            created_date,
        });

        working_set.consume(&lot.id, quantity);
        outstanding -= quantity;
        allocated_quantity += quantity;
        allocated_value += value;
    }

    Ok(RecordMatch {
        allocations,
        allocated_quantity,
        allocated_value,
        outstanding,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn lot(id: &str, d: u32, liters: Decimal, usd: Decimal) -> PurchaseLot {
        PurchaseLot::new(id, "V1", "S1", day(d), liters, usd)
    }

    fn now() -> NaiveDateTime {
        day(10).and_hms_opt(12, 0, 0).unwrap()
    }

    #[test]
    fn test_fifo_splits_across_lots() {
        let calc = ValueCalculator::default();
        let (mut ws, warnings) = LotWorkingSet::new(
            vec![lot("L1", 1, dec!(3000), dec!(3000)), lot("L2", 2, dec!(2000), dec!(2200))],
            &calc,
        );
        assert!(warnings.is_empty());

        let rec = ConsumptionRecord::new("C1", "V1", day(3), dec!(4000), 1);
        let m = match_record(&rec, dec!(4000), &mut ws, &calc, now()).unwrap();

        assert_eq!(m.allocations.len(), 2);
        assert_eq!(m.allocations[0].purchase_lot_id, "L1");
        assert_eq!(m.allocations[0].allocated_quantity, dec!(3000));
        assert_eq!(m.allocations[0].allocated_value_usd, dec!(3000));
        assert_eq!(m.allocations[1].purchase_lot_id, "L2");
        assert_eq!(m.allocations[1].allocated_quantity, dec!(1000));
        assert_eq!(m.allocations[1].allocated_value_usd, dec!(1100));
        assert_eq!(m.outstanding, Decimal::ZERO);

        assert_eq!(ws.remaining_of("L1"), Decimal::ZERO);
        assert_eq!(ws.remaining_of("L2"), dec!(1000));
        assert_eq!(ws.updates().len(), 2);
    }

    #[test]
    fn test_shortfall_leaves_outstanding() {
        let calc = ValueCalculator::default();
        let (mut ws, _) = LotWorkingSet::new(
            vec![lot("L1", 1, dec!(3000), dec!(3000)), lot("L2", 2, dec!(2000), dec!(2200))],
            &calc,
        );

        let rec = ConsumptionRecord::new("C1", "V1", day(3), dec!(6000), 1);
        let m = match_record(&rec, dec!(6000), &mut ws, &calc, now()).unwrap();

        assert_eq!(m.allocated_quantity, dec!(5000));
        assert_eq!(m.outstanding, dec!(1000));
        assert_eq!(ws.available(), Decimal::ZERO);
    }

    #[test]
    fn test_zero_quantity_lot_is_ineligible() {
        let calc = ValueCalculator::default();
        let (ws, warnings) = LotWorkingSet::new(
            vec![lot("L0", 1, dec!(0), dec!(10)), lot("L1", 2, dec!(100), dec!(100))],
            &calc,
        );
        assert_eq!(ws.lot_count(), 1);
        assert_eq!(warnings.len(), 1);
        assert!(matches!(&warnings[0], AllocationWarning::IneligibleLot { lot_id, .. } if lot_id == "L0"));
    }

    #[test]
    fn test_out_of_capacity_lot_is_not_silently_used() {
        let calc = ValueCalculator::default();
        let mut broken = lot("LX", 1, dec!(100), dec!(100));
        broken.remaining_quantity = dec!(150);

        let (ws, warnings) = LotWorkingSet::new(vec![broken], &calc);
        assert_eq!(ws.lot_count(), 0);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_untouched_lots_not_in_updates() {
        let calc = ValueCalculator::default();
        let (mut ws, _) = LotWorkingSet::new(
            vec![lot("L1", 1, dec!(3000), dec!(3000)), lot("L2", 2, dec!(2000), dec!(2200))],
            &calc,
        );
        let rec = ConsumptionRecord::new("C1", "V1", day(3), dec!(500), 1);
        match_record(&rec, dec!(500), &mut ws, &calc, now()).unwrap();

        let updates = ws.updates();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].lot_id, "L1");
        assert_eq!(updates[0].remaining_quantity, dec!(2500));
    }
}
