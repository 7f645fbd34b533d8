// ==========================================
// 船舶燃油核算系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::allocation_config::{AllocationConfig, MAX_CURRENCY_SCALE};
use crate::db::open_sqlite_connection;
use rusqlite::{params, Connection};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::error::Error;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    fn get_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 读取 global scope 的配置值（公开方法，供其他模块复用）
    pub fn get_global_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        self.get_config_value(key)
    }

    /// 写入 global scope 的配置值 (UPSERT)
    pub fn set_config_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value, updated_at) VALUES ('global', ?1, ?2, datetime('now'))
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;

        Ok(())
    }

    /// 获取全部 global 配置
    pub fn list_global_configs(&self) -> Result<HashMap<String, String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt = conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;

        let mut config_map = HashMap::new();
        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }
        Ok(config_map)
    }

    // ===== 分摊参数 =====

    /// 加载分摊/对账参数
    ///
    /// # 说明
    /// - 缺失的键使用默认值
    /// - 格式错误的值记录告警并回退默认值（不中断分摊）
    pub fn load_allocation_config(&self) -> Result<AllocationConfig, Box<dyn Error>> {
        let defaults = AllocationConfig::default();

        let quantity_tolerance_l = self.read_decimal(
            config_keys::QUANTITY_TOLERANCE_L,
            defaults.quantity_tolerance_l,
        )?;
        let value_tolerance_usd =
            self.read_decimal(config_keys::VALUE_TOLERANCE_USD, defaults.value_tolerance_usd)?;

        let currency_scale = match self.get_config_value(config_keys::CURRENCY_SCALE)? {
            Some(raw) => match raw.trim().parse::<u32>() {
                Ok(v) if v <= MAX_CURRENCY_SCALE => v,
                _ => {
                    tracing::warn!(key = config_keys::CURRENCY_SCALE, value = %raw, "配置值无效，使用默认值");
                    defaults.currency_scale
                }
            },
            None => defaults.currency_scale,
        };

        let config = AllocationConfig {
            quantity_tolerance_l,
            currency_scale,
            value_tolerance_usd,
        };
        config.validate()?;
        Ok(config)
    }

    fn read_decimal(&self, key: &str, default: Decimal) -> Result<Decimal, Box<dyn Error>> {
        match self.get_config_value(key)? {
            Some(raw) => match Decimal::from_str(raw.trim()) {
                Ok(v) if v >= Decimal::ZERO => Ok(v),
                _ => {
                    tracing::warn!(key, value = %raw, "配置值无效，使用默认值");
                    Ok(default)
                }
            },
            None => Ok(default),
        }
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    pub const QUANTITY_TOLERANCE_L: &str = "allocation/quantity_tolerance_l";
    pub const CURRENCY_SCALE: &str = "allocation/currency_scale";
    pub const VALUE_TOLERANCE_USD: &str = "reconciliation/value_tolerance_usd";
}
