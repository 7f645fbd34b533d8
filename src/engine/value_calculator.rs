// ==========================================
// 船舶燃油核算系统 - 计价器
// ==========================================
// 职责: 批次单价与分摊金额计算
// 红线: 分摊金额全精度累计，仅在汇总/报表边界舍入
// ==========================================

use crate::domain::PurchaseLot;
use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;

/// 计价错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValuationError {
    #[error("批次 {lot_id} 采购量为 0，无法计算单价")]
    DivisionByZero { lot_id: String },
}

// ==========================================
// ValueCalculator
// ==========================================
#[derive(Debug, Clone, Copy)]
pub struct ValueCalculator {
    currency_scale: u32,
}

impl Default for ValueCalculator {
    fn default() -> Self {
        Self::new(crate::config::allocation_config::DEFAULT_CURRENCY_SCALE)
    }
}

impl ValueCalculator {
    pub fn new(currency_scale: u32) -> Self {
        Self { currency_scale }
    }

    /// 批次单价 = total_value_usd / quantity_liters
    pub fn unit_cost(&self, lot: &PurchaseLot) -> Result<Decimal, ValuationError> {
        lot.total_value_usd
            .checked_div(lot.quantity_liters)
            .ok_or_else(|| ValuationError::DivisionByZero {
                lot_id: lot.id.clone(),
            })
    }

    /// 批次是否可参与分摊
    pub fn is_eligible(&self, lot: &PurchaseLot) -> bool {
        self.unit_cost(lot).is_ok()
    }

    /// 分摊金额 = 单价 × 数量（全精度）
    ///
    /// 先乘后除，与 unit_cost × quantity 等值，但避免单价截断带来的误差。
    pub fn allocated_value(&self, lot: &PurchaseLot, quantity: Decimal) -> Result<Decimal, ValuationError> {
        if lot.quantity_liters.is_zero() {
            return Err(ValuationError::DivisionByZero {
                lot_id: lot.id.clone(),
            });
        }

        match lot
            .total_value_usd
            .checked_mul(quantity)
            .and_then(|v| v.checked_div(lot.quantity_liters))
        {
            Some(value) => Ok(value),
            None => Ok(self.unit_cost(lot)? * quantity),
        }
    }

    /// 按币种精度舍入（仅用于汇总/报表）
    pub fn round_currency(&self, value: Decimal) -> Decimal {
        value.round_dp_with_strategy(self.currency_scale, RoundingStrategy::MidpointAwayFromZero)
    }

    /// 加权平均单价（总金额 / 总数量）
    pub fn average_unit_cost(total_value: Decimal, total_quantity: Decimal) -> Option<Decimal> {
        total_value.checked_div(total_quantity)
    }

    pub fn currency_scale(&self) -> u32 {
        self.currency_scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn lot(id: &str, liters: Decimal, usd: Decimal) -> PurchaseLot {
        PurchaseLot::new(id, "V1", "S1", NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), liters, usd)
    }

    #[test]
    fn test_unit_cost() {
        let calc = ValueCalculator::default();
        assert_eq!(calc.unit_cost(&lot("L1", dec!(3000), dec!(3000))).unwrap(), dec!(1));
        assert_eq!(calc.unit_cost(&lot("L2", dec!(2000), dec!(2200))).unwrap(), dec!(1.1));
    }

    #[test]
    fn test_zero_quantity_is_division_by_zero() {
        let calc = ValueCalculator::default();
        let zero = lot("L0", dec!(0), dec!(100));
        assert_eq!(
            calc.unit_cost(&zero),
            Err(ValuationError::DivisionByZero { lot_id: "L0".to_string() })
        );
        assert!(!calc.is_eligible(&zero));
        assert!(calc.allocated_value(&zero, dec!(1)).is_err());
    }

    #[test]
    fn test_allocated_value_proportional() {
        let calc = ValueCalculator::default();
        let l2 = lot("L2", dec!(2000), dec!(2200));
        assert_eq!(calc.allocated_value(&l2, dec!(1000)).unwrap(), dec!(1100));
    }

    #[test]
    fn test_small_allocations_do_not_compound_rounding() {
        // 1000 美元 / 3 升: 单价无限小数
        let calc = ValueCalculator::default();
        let l = lot("L3", dec!(3), dec!(1000));

        let total: Decimal = (0..3)
            .map(|_| calc.allocated_value(&l, dec!(1)).unwrap())
            .sum();

        assert_eq!(calc.round_currency(total), dec!(1000.00));
    }

    #[test]
    fn test_round_currency_midpoint_away_from_zero() {
        let calc = ValueCalculator::new(2);
        assert_eq!(calc.round_currency(dec!(1.005)), dec!(1.01));
        assert_eq!(calc.round_currency(dec!(-1.005)), dec!(-1.01));
        assert_eq!(calc.round_currency(dec!(1100.0000001)), dec!(1100.00));
    }

    #[test]
    fn test_average_unit_cost() {
        assert_eq!(ValueCalculator::average_unit_cost(dec!(4100), dec!(4000)), Some(dec!(1.025)));
        assert_eq!(ValueCalculator::average_unit_cost(dec!(1), Decimal::ZERO), None);
    }
}
