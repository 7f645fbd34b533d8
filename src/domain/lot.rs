// ==========================================
// 船舶燃油核算系统 - 采购批次领域模型
// ==========================================
// 红线: 0 ≤ remaining_quantity ≤ quantity_liters
// 红线: remaining_quantity 必须可由分摊记录重新推导
// ==========================================

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ==========================================
// PurchaseLot - 采购批次
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseLot {
    // ===== 主键与归属 =====
    pub id: String,
    pub vessel_id: String,
    pub supplier_id: String,
    pub purchase_date: NaiveDate,

    // ===== 数量 =====
    pub quantity_liters: Decimal,      // 采购总量 (升)
    pub quantity_tons: Decimal,        // 采购总量 (吨)

    // ===== 金额 =====
    pub total_value: Decimal,          // 本币金额
    pub total_value_usd: Decimal,      // 美元金额（分摊计价依据）

    // ===== 余量 =====
    pub remaining_quantity: Decimal,   // 未消耗余量 (升)

    pub invoice_reference: Option<String>,
}

impl PurchaseLot {
    /// 新建批次（余量 = 采购量）
    pub fn new(
        id: impl Into<String>,
        vessel_id: impl Into<String>,
        supplier_id: impl Into<String>,
        purchase_date: NaiveDate,
        quantity_liters: Decimal,
        total_value_usd: Decimal,
    ) -> Self {
        Self {
            id: id.into(),
            vessel_id: vessel_id.into(),
            supplier_id: supplier_id.into(),
            purchase_date,
            quantity_liters,
            quantity_tons: Decimal::ZERO,
            total_value: total_value_usd,
            total_value_usd,
            remaining_quantity: quantity_liters,
            invoice_reference: None,
        }
    }

    /// 剩余量是否在容量范围内
    pub fn is_within_capacity(&self) -> bool {
        self.remaining_quantity >= Decimal::ZERO && self.remaining_quantity <= self.quantity_liters
    }

    /// 已消耗量
    pub fn consumed_quantity(&self) -> Decimal {
        self.quantity_liters - self.remaining_quantity
    }
}

// ==========================================
// LotRemainingUpdate - 批次余量写回
// ==========================================
// 用途: 分摊工作集一次性提交
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LotRemainingUpdate {
    pub lot_id: String,
    pub remaining_quantity: Decimal,
}
