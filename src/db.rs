// ==========================================
// 船舶燃油核算系统 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的连接配置
// - 统一 busy_timeout，减少偶发 busy 错误
// - 建库: 批次/消耗/分摊 三张核心表 + 配置表
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一参数
///
/// 说明：
/// - busy_timeout 需要“每个连接”单独配置
/// - schema 不含外键，不开启 foreign_keys
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 初始化 schema（幂等）
///
/// 说明：
/// - 数量/金额以十进制文本存储，避免浮点误差进入账本
/// - fuel_allocation 不对批次/消耗建外键：上游删除批次后遗留的孤儿分摊由对账发现
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        );

        CREATE TABLE IF NOT EXISTS purchase_lot (
            lot_id TEXT PRIMARY KEY,
            vessel_id TEXT NOT NULL,
            supplier_id TEXT NOT NULL,
            purchase_date TEXT NOT NULL,
            quantity_liters TEXT NOT NULL,
            quantity_tons TEXT NOT NULL DEFAULT '0',
            total_value TEXT NOT NULL DEFAULT '0',
            total_value_usd TEXT NOT NULL,
            remaining_quantity TEXT NOT NULL,
            invoice_reference TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_purchase_lot_vessel_date
            ON purchase_lot(vessel_id, purchase_date, lot_id);

        CREATE TABLE IF NOT EXISTS consumption_record (
            consumption_id TEXT PRIMARY KEY,
            vessel_id TEXT NOT NULL,
            consumption_date TEXT NOT NULL,
            month TEXT NOT NULL,
            consumption_liters TEXT NOT NULL,
            legs_completed INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_consumption_vessel_date
            ON consumption_record(vessel_id, consumption_date, consumption_id);

        CREATE TABLE IF NOT EXISTS fuel_allocation (
            allocation_id TEXT PRIMARY KEY,
            lot_id TEXT NOT NULL,
            consumption_id TEXT NOT NULL,
            month TEXT NOT NULL,
            allocated_quantity TEXT NOT NULL,
            allocated_value_usd TEXT NOT NULL,
            created_date TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_fuel_allocation_lot ON fuel_allocation(lot_id);
        CREATE INDEX IF NOT EXISTS idx_fuel_allocation_consumption ON fuel_allocation(consumption_id);
        CREATE INDEX IF NOT EXISTS idx_fuel_allocation_month ON fuel_allocation(month);
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;

    Ok(())
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}
