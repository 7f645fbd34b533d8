use crate::db::{init_schema, open_sqlite_connection};
use crate::domain::{Allocation, AllocationScope, ConsumptionRecord, LotRemainingUpdate, PurchaseLot};
use crate::repository::error::{FieldParseError, RepositoryError, RepositoryResult};
use crate::repository::ledger_store::{CleanupOutcome, LedgerStore, ReplaceOutcome};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::types::Type;
use rusqlite::{Connection, Result as SqliteResult, Row};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

pub(super) const DATE_FORMAT: &str = "%Y-%m-%d";
pub(super) const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ==========================================
// SqliteLedgerStore - 账本仓储
// ==========================================
// 红线: Repository 不做业务逻辑,只做数据映射
pub struct SqliteLedgerStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteLedgerStore {
    /// 基于共享连接创建仓储
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 打开数据库文件并确保 schema 存在
    pub fn open(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        init_schema(&conn)?;
        Ok(Self::new(Arc::new(Mutex::new(conn))))
    }

    /// 获取数据库连接
    pub(super) fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }
}

// ==========================================
// 字段编解码
// ==========================================

/// 十进制文本（去掉多余的尾零）
pub(super) fn decimal_text(value: Decimal) -> String {
    value.normalize().to_string()
}

pub(super) fn decimal_at(row: &Row<'_>, idx: usize) -> SqliteResult<Decimal> {
    let raw: String = row.get(idx)?;
    Decimal::from_str(raw.trim())
        .map_err(|e| field_error(row, idx, format!("无法解析十进制数 '{}': {}", raw, e)))
}

pub(super) fn date_at(row: &Row<'_>, idx: usize) -> SqliteResult<NaiveDate> {
    let raw: String = row.get(idx)?;
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .map_err(|e| field_error(row, idx, format!("无法解析日期 '{}': {}", raw, e)))
}

pub(super) fn datetime_at(row: &Row<'_>, idx: usize) -> SqliteResult<NaiveDateTime> {
    let raw: String = row.get(idx)?;
    NaiveDateTime::parse_from_str(raw.trim(), DATETIME_FORMAT)
        .map_err(|e| field_error(row, idx, format!("无法解析时间 '{}': {}", raw, e)))
}

/// 列值解析失败 → FromSqlConversionFailure（携带列名，转换为 FieldValueError）
fn field_error(row: &Row<'_>, idx: usize, message: String) -> rusqlite::Error {
    let field = row
        .as_ref()
        .column_name(idx)
        .map(|name| name.to_string())
        .unwrap_or_else(|_| format!("#{}", idx));
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        Type::Text,
        Box::new(FieldParseError { field, message }),
    )
}

// ==========================================
// LedgerStore 实现（委托给 queries / writes）
// ==========================================
impl LedgerStore for SqliteLedgerStore {
    fn insert_lot(&self, lot: &PurchaseLot) -> RepositoryResult<()> {
        SqliteLedgerStore::insert_lot(self, lot)
    }

    fn insert_consumption(&self, record: &ConsumptionRecord) -> RepositoryResult<()> {
        SqliteLedgerStore::insert_consumption(self, record)
    }

    fn load_consumption(&self, scope: AllocationScope) -> RepositoryResult<Vec<ConsumptionRecord>> {
        SqliteLedgerStore::load_consumption(self, scope)
    }

    fn load_lots_for_vessel(&self, vessel_id: &str) -> RepositoryResult<Vec<PurchaseLot>> {
        SqliteLedgerStore::load_lots_for_vessel(self, vessel_id)
    }

    fn load_all_lots(&self) -> RepositoryResult<Vec<PurchaseLot>> {
        SqliteLedgerStore::load_all_lots(self)
    }

    fn load_all_allocations(&self) -> RepositoryResult<Vec<Allocation>> {
        SqliteLedgerStore::load_all_allocations(self)
    }

    fn allocated_by_consumption(&self) -> RepositoryResult<HashMap<String, Decimal>> {
        SqliteLedgerStore::allocated_by_consumption(self)
    }

    fn persist_allocation_batch(
        &self,
        allocations: &[Allocation],
        lot_updates: &[LotRemainingUpdate],
    ) -> RepositoryResult<usize> {
        SqliteLedgerStore::persist_allocation_batch(self, allocations, lot_updates)
    }

    fn replace_all_allocations(
        &self,
        allocations: &[Allocation],
        lot_updates: &[LotRemainingUpdate],
    ) -> RepositoryResult<ReplaceOutcome> {
        SqliteLedgerStore::replace_all_allocations(self, allocations, lot_updates)
    }

    fn delete_all_allocations(&self) -> RepositoryResult<usize> {
        SqliteLedgerStore::delete_all_allocations(self)
    }

    fn reset_all_lot_remaining(&self) -> RepositoryResult<usize> {
        SqliteLedgerStore::reset_all_lot_remaining(self)
    }

    fn delete_orphan_allocations(&self) -> RepositoryResult<usize> {
        SqliteLedgerStore::delete_orphan_allocations(self)
    }

    fn fix_lot_remaining(&self, lot_id: &str, value: Decimal) -> RepositoryResult<()> {
        SqliteLedgerStore::fix_lot_remaining(self, lot_id, value)
    }

    fn apply_manual_cleanup(
        &self,
        orphan_allocation_ids: &[String],
        lot_fixes: &[LotRemainingUpdate],
    ) -> RepositoryResult<CleanupOutcome> {
        SqliteLedgerStore::apply_manual_cleanup(self, orphan_allocation_ids, lot_fixes)
    }
}
