// ==========================================
// 测试数据构建器 - 用于集成测试
// ==========================================

#![allow(dead_code)]

use chrono::NaiveDate;
use fuel_ledger::domain::{ConsumptionRecord, PurchaseLot};
use rust_decimal::Decimal;

/// 测试日期 (2024 年)
pub fn day(month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, month, day).unwrap()
}

// ==========================================
// PurchaseLot 构建器
// ==========================================

pub struct LotBuilder {
    id: String,
    vessel_id: String,
    supplier_id: String,
    purchase_date: NaiveDate,
    quantity_liters: Decimal,
    total_value_usd: Decimal,
    remaining_quantity: Option<Decimal>,
    invoice_reference: Option<String>,
}

impl LotBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            vessel_id: "V1".to_string(),
            supplier_id: "S1".to_string(),
            purchase_date: day(1, 1),
            quantity_liters: Decimal::ZERO,
            total_value_usd: Decimal::ZERO,
            remaining_quantity: None,
            invoice_reference: None,
        }
    }

    pub fn vessel(mut self, vessel_id: &str) -> Self {
        self.vessel_id = vessel_id.to_string();
        self
    }

    pub fn supplier(mut self, supplier_id: &str) -> Self {
        self.supplier_id = supplier_id.to_string();
        self
    }

    pub fn purchased_on(mut self, date: NaiveDate) -> Self {
        self.purchase_date = date;
        self
    }

    pub fn liters(mut self, quantity: Decimal) -> Self {
        self.quantity_liters = quantity;
        self
    }

    pub fn value_usd(mut self, value: Decimal) -> Self {
        self.total_value_usd = value;
        self
    }

    pub fn remaining(mut self, remaining: Decimal) -> Self {
        self.remaining_quantity = Some(remaining);
        self
    }

    pub fn invoice(mut self, reference: &str) -> Self {
        self.invoice_reference = Some(reference.to_string());
        self
    }

    pub fn build(self) -> PurchaseLot {
        let mut lot = PurchaseLot::new(
            &self.id,
            &self.vessel_id,
            &self.supplier_id,
            self.purchase_date,
            self.quantity_liters,
            self.total_value_usd,
        );
        if let Some(remaining) = self.remaining_quantity {
            lot.remaining_quantity = remaining;
        }
        lot.invoice_reference = self.invoice_reference;
        lot
    }
}

// ==========================================
// ConsumptionRecord 构建器
// ==========================================

pub struct ConsumptionBuilder {
    id: String,
    vessel_id: String,
    consumption_date: NaiveDate,
    consumption_liters: Decimal,
    legs_completed: i32,
}

impl ConsumptionBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            vessel_id: "V1".to_string(),
            consumption_date: day(1, 15),
            consumption_liters: Decimal::ZERO,
            legs_completed: 1,
        }
    }

    pub fn vessel(mut self, vessel_id: &str) -> Self {
        self.vessel_id = vessel_id.to_string();
        self
    }

    pub fn on(mut self, date: NaiveDate) -> Self {
        self.consumption_date = date;
        self
    }

    pub fn liters(mut self, quantity: Decimal) -> Self {
        self.consumption_liters = quantity;
        self
    }

    pub fn legs(mut self, legs: i32) -> Self {
        self.legs_completed = legs;
        self
    }

    pub fn build(self) -> ConsumptionRecord {
        ConsumptionRecord::new(
            &self.id,
            &self.vessel_id,
            self.consumption_date,
            self.consumption_liters,
            self.legs_completed,
        )
    }
}
