use super::core::{decimal_text, SqliteLedgerStore, DATETIME_FORMAT, DATE_FORMAT};
use crate::domain::{Allocation, ConsumptionRecord, LotRemainingUpdate, PurchaseLot};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::ledger_store::{CleanupOutcome, ReplaceOutcome};
use rusqlite::{params, Connection};
use rust_decimal::Decimal;

const ORPHAN_PREDICATE: &str = r#"
    NOT EXISTS (SELECT 1 FROM purchase_lot l WHERE l.lot_id = a.lot_id)
    OR NOT EXISTS (SELECT 1 FROM consumption_record c WHERE c.consumption_id = a.consumption_id)
"#;

impl SqliteLedgerStore {
    // ==========================================
    // 上游录入
    // ==========================================

    /// 录入采购批次
    pub fn insert_lot(&self, lot: &PurchaseLot) -> RepositoryResult<()> {
        let conn = self.get_conn()?;

        conn.execute(
            r#"
            INSERT INTO purchase_lot (
                lot_id, vessel_id, supplier_id, purchase_date, quantity_liters, quantity_tons,
                total_value, total_value_usd, remaining_quantity, invoice_reference
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                lot.id,
                lot.vessel_id,
                lot.supplier_id,
                lot.purchase_date.format(DATE_FORMAT).to_string(),
                decimal_text(lot.quantity_liters),
                decimal_text(lot.quantity_tons),
                decimal_text(lot.total_value),
                decimal_text(lot.total_value_usd),
                decimal_text(lot.remaining_quantity),
                lot.invoice_reference,
            ],
        )?;

        Ok(())
    }

    /// 录入消耗记录
    pub fn insert_consumption(&self, record: &ConsumptionRecord) -> RepositoryResult<()> {
        let conn = self.get_conn()?;

        conn.execute(
            r#"
            INSERT INTO consumption_record (
                consumption_id, vessel_id, consumption_date, month, consumption_liters, legs_completed
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                record.id,
                record.vessel_id,
                record.consumption_date.format(DATE_FORMAT).to_string(),
                record.month,
                decimal_text(record.consumption_liters),
                record.legs_completed,
            ],
        )?;

        Ok(())
    }

    // ==========================================
    // 原子写入
    // ==========================================

    /// 一次性提交分摊记录与批次余量
    pub fn persist_allocation_batch(
        &self,
        allocations: &[Allocation],
        lot_updates: &[LotRemainingUpdate],
    ) -> RepositoryResult<usize> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let inserted = insert_allocation_rows(&tx, allocations)?;
        update_lot_rows(&tx, lot_updates)?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(inserted)
    }

    /// 全量替换分摊（单事务）
    pub fn replace_all_allocations(
        &self,
        allocations: &[Allocation],
        lot_updates: &[LotRemainingUpdate],
    ) -> RepositoryResult<ReplaceOutcome> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let allocations_deleted = tx.execute("DELETE FROM fuel_allocation", [])?;
        let lots_reset = reset_lot_rows(&tx)?;
        let allocations_inserted = insert_allocation_rows(&tx, allocations)?;
        let lots_updated = update_lot_rows(&tx, lot_updates)?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        Ok(ReplaceOutcome {
            allocations_deleted,
            lots_reset,
            allocations_inserted,
            lots_updated,
        })
    }

    /// 删除全部分摊记录
    pub fn delete_all_allocations(&self) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let rows = conn.execute("DELETE FROM fuel_allocation", [])?;
        Ok(rows)
    }

    /// 全部批次余量重置为采购量
    pub fn reset_all_lot_remaining(&self) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        reset_lot_rows(&conn)
    }

    /// 删除孤儿分摊
    pub fn delete_orphan_allocations(&self) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let sql = format!(
            "DELETE FROM fuel_allocation WHERE allocation_id IN (SELECT a.allocation_id FROM fuel_allocation AS a WHERE {})",
            ORPHAN_PREDICATE
        );
        let rows = conn.execute(&sql, [])?;
        Ok(rows)
    }

    /// 查询孤儿分摊 ID
    pub fn find_orphan_allocation_ids(&self) -> RepositoryResult<Vec<String>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT a.allocation_id FROM fuel_allocation AS a WHERE {} ORDER BY a.allocation_id",
            ORPHAN_PREDICATE
        );
        let mut stmt = conn.prepare(&sql)?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(ids)
    }

    /// 覆写单个批次余量
    pub fn fix_lot_remaining(&self, lot_id: &str, value: Decimal) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        update_lot_rows(
            &conn,
            &[LotRemainingUpdate {
                lot_id: lot_id.to_string(),
                remaining_quantity: value,
            }],
        )?;
        Ok(())
    }

    /// 定点清理（单事务）
    pub fn apply_manual_cleanup(
        &self,
        orphan_allocation_ids: &[String],
        lot_fixes: &[LotRemainingUpdate],
    ) -> RepositoryResult<CleanupOutcome> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let mut allocations_deleted = 0;
        {
            let mut stmt = tx.prepare_cached("DELETE FROM fuel_allocation WHERE allocation_id = ?1")?;
            for allocation_id in orphan_allocation_ids {
                allocations_deleted += stmt.execute(params![allocation_id])?;
            }
        }
        let lots_fixed = update_lot_rows(&tx, lot_fixes)?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        Ok(CleanupOutcome {
            allocations_deleted,
            lots_fixed,
        })
    }
}

// ==========================================
// 连接级写入（事务内复用）
// ==========================================

fn insert_allocation_rows(conn: &Connection, allocations: &[Allocation]) -> RepositoryResult<usize> {
    let mut stmt = conn.prepare_cached(
        r#"
        INSERT INTO fuel_allocation (
            allocation_id, lot_id, consumption_id, month,
            allocated_quantity, allocated_value_usd, created_date
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )?;

    let mut count = 0;
    for allocation in allocations {
        stmt.execute(params![
            allocation.id,
            allocation.purchase_lot_id,
            allocation.consumption_id,
            allocation.month,
            decimal_text(allocation.allocated_quantity),
            // 分摊金额全精度存储
            allocation.allocated_value_usd.to_string(),
            allocation.created_date.format(DATETIME_FORMAT).to_string(),
        ])?;
        count += 1;
    }
    Ok(count)
}

/// 更新批次余量；批次不存在时报错以触发整体回滚
fn update_lot_rows(conn: &Connection, updates: &[LotRemainingUpdate]) -> RepositoryResult<usize> {
    let mut stmt = conn.prepare_cached("UPDATE purchase_lot SET remaining_quantity = ?1 WHERE lot_id = ?2")?;

    let mut count = 0;
    for update in updates {
        let rows = stmt.execute(params![decimal_text(update.remaining_quantity), update.lot_id])?;
        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "PurchaseLot".to_string(),
                id: update.lot_id.clone(),
            });
        }
        count += rows;
    }
    Ok(count)
}

fn reset_lot_rows(conn: &Connection) -> RepositoryResult<usize> {
    let rows = conn.execute("UPDATE purchase_lot SET remaining_quantity = quantity_liters", [])?;
    Ok(rows)
}
