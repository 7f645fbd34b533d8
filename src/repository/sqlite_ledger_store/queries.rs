use super::core::{date_at, datetime_at, decimal_at, SqliteLedgerStore};
use crate::domain::{Allocation, AllocationScope, ConsumptionRecord, PurchaseLot};
use crate::repository::error::RepositoryResult;
use rusqlite::{params, Connection, Result as SqliteResult, Row};
use rust_decimal::Decimal;
use std::collections::HashMap;

const LOT_COLUMNS: &str = r#"
    lot_id, vessel_id, supplier_id, purchase_date, quantity_liters, quantity_tons,
    total_value, total_value_usd, remaining_quantity, invoice_reference
"#;

const CONSUMPTION_COLUMNS: &str = r#"
    consumption_id, vessel_id, consumption_date, month, consumption_liters, legs_completed
"#;

const ALLOCATION_COLUMNS: &str = r#"
    allocation_id, lot_id, consumption_id, month, allocated_quantity,
    allocated_value_usd, created_date
"#;

impl SqliteLedgerStore {
    // ==========================================
    // 查询操作
    // ==========================================

    /// 加载范围内的消耗记录，按 (vessel_id, consumption_date, id) 升序
    pub fn load_consumption(&self, scope: AllocationScope) -> RepositoryResult<Vec<ConsumptionRecord>> {
        let conn = self.get_conn()?;
        let records = query_consumption(&conn)?;

        match scope {
            AllocationScope::All => Ok(records),
            AllocationScope::Unallocated => {
                // 金额/数量为十进制文本, 合计在内存中完成, 避免 SQL 浮点求和
                let allocated = query_allocated_by_consumption(&conn)?;
                Ok(records
                    .into_iter()
                    .filter(|r| {
                        let done = allocated.get(&r.id).copied().unwrap_or(Decimal::ZERO);
                        done < r.consumption_liters
                    })
                    .collect())
            }
        }
    }

    /// 加载船舶的可用批次 (remaining > 0)，按 (purchase_date, id) 升序
    pub fn load_lots_for_vessel(&self, vessel_id: &str) -> RepositoryResult<Vec<PurchaseLot>> {
        let conn = self.get_conn()?;

        let sql = format!(
            "SELECT {} FROM purchase_lot WHERE vessel_id = ?1 ORDER BY purchase_date ASC, lot_id ASC",
            LOT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let lots = stmt
            .query_map(params![vessel_id], map_lot_row)?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(lots
            .into_iter()
            .filter(|lot| lot.remaining_quantity > Decimal::ZERO)
            .collect())
    }

    /// 加载全部批次，按 (vessel_id, purchase_date, id) 升序
    pub fn load_all_lots(&self) -> RepositoryResult<Vec<PurchaseLot>> {
        let conn = self.get_conn()?;

        let sql = format!(
            "SELECT {} FROM purchase_lot ORDER BY vessel_id ASC, purchase_date ASC, lot_id ASC",
            LOT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let lots = stmt
            .query_map([], map_lot_row)?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(lots)
    }

    /// 按 ID 查询单个批次
    pub fn find_lot(&self, lot_id: &str) -> RepositoryResult<Option<PurchaseLot>> {
        let conn = self.get_conn()?;

        let sql = format!("SELECT {} FROM purchase_lot WHERE lot_id = ?1", LOT_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;

        match stmt.query_row(params![lot_id], map_lot_row) {
            Ok(lot) => Ok(Some(lot)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 加载全部分摊记录，按 (created_date, id) 升序
    pub fn load_all_allocations(&self) -> RepositoryResult<Vec<Allocation>> {
        let conn = self.get_conn()?;

        let sql = format!(
            "SELECT {} FROM fuel_allocation ORDER BY created_date ASC, allocation_id ASC",
            ALLOCATION_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let allocations = stmt
            .query_map([], map_allocation_row)?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(allocations)
    }

    /// 查询指定消耗的分摊记录
    pub fn find_allocations_by_consumption(&self, consumption_id: &str) -> RepositoryResult<Vec<Allocation>> {
        let conn = self.get_conn()?;

        let sql = format!(
            "SELECT {} FROM fuel_allocation WHERE consumption_id = ?1 ORDER BY created_date ASC, allocation_id ASC",
            ALLOCATION_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let allocations = stmt
            .query_map(params![consumption_id], map_allocation_row)?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(allocations)
    }

    /// 每条消耗的已分摊合计
    pub fn allocated_by_consumption(&self) -> RepositoryResult<HashMap<String, Decimal>> {
        let conn = self.get_conn()?;
        query_allocated_by_consumption(&conn)
    }
}

// ==========================================
// 连接级查询（供事务内复用）
// ==========================================

pub(super) fn query_consumption(conn: &Connection) -> RepositoryResult<Vec<ConsumptionRecord>> {
    let sql = format!(
        "SELECT {} FROM consumption_record ORDER BY vessel_id ASC, consumption_date ASC, consumption_id ASC",
        CONSUMPTION_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let records = stmt
        .query_map([], map_consumption_row)?
        .collect::<SqliteResult<Vec<_>>>()?;
    Ok(records)
}

pub(super) fn query_allocated_by_consumption(conn: &Connection) -> RepositoryResult<HashMap<String, Decimal>> {
    let mut stmt = conn.prepare("SELECT consumption_id, allocated_quantity FROM fuel_allocation")?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, decimal_at(row, 1)?)))?;

    let mut totals: HashMap<String, Decimal> = HashMap::new();
    for row in rows {
        let (consumption_id, quantity) = row?;
        *totals.entry(consumption_id).or_insert(Decimal::ZERO) += quantity;
    }
    Ok(totals)
}

// ==========================================
// 行映射
// ==========================================

fn map_lot_row(row: &Row<'_>) -> SqliteResult<PurchaseLot> {
    Ok(PurchaseLot {
        id: row.get(0)?,
        vessel_id: row.get(1)?,
        supplier_id: row.get(2)?,
        purchase_date: date_at(row, 3)?,
        quantity_liters: decimal_at(row, 4)?,
        quantity_tons: decimal_at(row, 5)?,
        total_value: decimal_at(row, 6)?,
        total_value_usd: decimal_at(row, 7)?,
        remaining_quantity: decimal_at(row, 8)?,
        invoice_reference: row.get(9)?,
    })
}

fn map_consumption_row(row: &Row<'_>) -> SqliteResult<ConsumptionRecord> {
    Ok(ConsumptionRecord {
        id: row.get(0)?,
        vessel_id: row.get(1)?,
        consumption_date: date_at(row, 2)?,
        month: row.get(3)?,
        consumption_liters: decimal_at(row, 4)?,
        legs_completed: row.get(5)?,
    })
}

fn map_allocation_row(row: &Row<'_>) -> SqliteResult<Allocation> {
    Ok(Allocation {
        id: row.get(0)?,
        purchase_lot_id: row.get(1)?,
        consumption_id: row.get(2)?,
        month: row.get(3)?,
        allocated_quantity: decimal_at(row, 4)?,
        allocated_value_usd: decimal_at(row, 5)?,
        created_date: datetime_at(row, 6)?,
    })
}
