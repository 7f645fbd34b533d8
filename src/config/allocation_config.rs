// ==========================================
// 船舶燃油核算系统 - 分摊参数
// ==========================================
// 存储: config_kv 表 (scope_id='global')
// ==========================================

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 默认数量容差 (升)
pub const DEFAULT_QUANTITY_TOLERANCE_L: Decimal = Decimal::from_parts(1, 0, 0, false, 3);
/// 默认币种精度 (小数位)
pub const DEFAULT_CURRENCY_SCALE: u32 = 2;
/// 默认金额容差 (美元)
pub const DEFAULT_VALUE_TOLERANCE_USD: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// 币种精度上限
pub const MAX_CURRENCY_SCALE: u32 = 8;

// ==========================================
// AllocationConfig - 分摊/对账参数
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationConfig {
    /// 数量容差: 低于该值的未分摊量视为已分摊完毕
    pub quantity_tolerance_l: Decimal,
    /// 报表/汇总时的金额小数位
    pub currency_scale: u32,
    /// 对账时的金额容差
    pub value_tolerance_usd: Decimal,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            quantity_tolerance_l: DEFAULT_QUANTITY_TOLERANCE_L,
            currency_scale: DEFAULT_CURRENCY_SCALE,
            value_tolerance_usd: DEFAULT_VALUE_TOLERANCE_USD,
        }
    }
}

impl AllocationConfig {
    /// 参数合法性检查
    pub fn validate(&self) -> Result<(), String> {
        if self.quantity_tolerance_l < Decimal::ZERO {
            return Err(format!("数量容差不能为负: {}", self.quantity_tolerance_l));
        }
        if self.value_tolerance_usd < Decimal::ZERO {
            return Err(format!("金额容差不能为负: {}", self.value_tolerance_usd));
        }
        if self.currency_scale > MAX_CURRENCY_SCALE {
            return Err(format!(
                "币种精度超出范围: {} (最大 {})",
                self.currency_scale, MAX_CURRENCY_SCALE
            ));
        }
        Ok(())
    }
}
