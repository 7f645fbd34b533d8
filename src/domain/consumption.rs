// ==========================================
// 船舶燃油核算系统 - 燃油消耗领域模型
// ==========================================

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 月份格式 (YYYY-MM)
pub const MONTH_FORMAT: &str = "%Y-%m";

/// 由日期推导月份
pub fn month_of(date: NaiveDate) -> String {
    date.format(MONTH_FORMAT).to_string()
}

// ==========================================
// ConsumptionRecord - 航段燃油消耗
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumptionRecord {
    pub id: String,
    pub vessel_id: String,
    pub consumption_date: NaiveDate,
    pub month: String,                 // 由 consumption_date 推导
    pub consumption_liters: Decimal,
    pub legs_completed: i32,
}

impl ConsumptionRecord {
    pub fn new(
        id: impl Into<String>,
        vessel_id: impl Into<String>,
        consumption_date: NaiveDate,
        consumption_liters: Decimal,
        legs_completed: i32,
    ) -> Self {
        Self {
            id: id.into(),
            vessel_id: vessel_id.into(),
            consumption_date,
            month: month_of(consumption_date),
            consumption_liters,
            legs_completed,
        }
    }
}
