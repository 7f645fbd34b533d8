// ==========================================
// 船舶燃油核算系统 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// ==========================================

use std::sync::{Arc, Mutex};

use crate::api::FuelAllocationApi;
use crate::config::config_manager::ConfigManager;
use crate::db::{init_schema, open_sqlite_connection};
use crate::engine::{AllocationEngine, ReconciliationService};
use crate::repository::{LedgerStore, SqliteLedgerStore};

/// 应用状态
///
/// 包含所有API实例和共享资源
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 账本仓储（共享连接）
    pub store: Arc<dyn LedgerStore>,

    /// 配置管理器
    pub config_manager: Arc<ConfigManager>,

    /// 分摊引擎
    pub allocation_engine: Arc<AllocationEngine>,

    /// 对账服务（与分摊引擎共享运行守卫）
    pub reconciliation: Arc<ReconciliationService>,

    /// 燃油分摊API
    pub fuel_allocation_api: Arc<FuelAllocationApi>,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    ///
    /// # 返回
    /// - Ok(AppState): 应用状态实例
    /// - Err(String): 初始化错误
    ///
    /// # 说明
    /// 该方法会：
    /// 1. 打开共享连接并确保 schema 存在
    /// 2. 从 config_kv 读取分摊参数
    /// 3. 创建引擎、对账服务与API实例
    pub fn new(db_path: String) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let conn = open_sqlite_connection(&db_path)
            .map_err(|e| format!("无法打开数据库: {}", e))?;
        init_schema(&conn).map_err(|e| format!("数据库初始化失败: {}", e))?;
        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // 初始化Repository层
        // ==========================================
        let store: Arc<dyn LedgerStore> = Arc::new(SqliteLedgerStore::new(conn.clone()));

        // ==========================================
        // 初始化配置
        // ==========================================
        let config_manager = Arc::new(
            ConfigManager::from_connection(conn.clone())
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );
        let config = config_manager
            .load_allocation_config()
            .map_err(|e| format!("无法读取分摊配置: {}", e))?;
        config.validate().map_err(|e| format!("分摊配置无效: {}", e))?;
        tracing::info!(
            quantity_tolerance_l = %config.quantity_tolerance_l,
            currency_scale = config.currency_scale,
            value_tolerance_usd = %config.value_tolerance_usd,
            "分摊配置已加载"
        );

        // ==========================================
        // 初始化Engine层
        // ==========================================
        let allocation_engine = Arc::new(AllocationEngine::new(store.clone(), config));
        let reconciliation = Arc::new(ReconciliationService::new(
            store.clone(),
            allocation_engine.clone(),
        ));

        // ==========================================
        // 初始化API层
        // ==========================================
        let fuel_allocation_api = Arc::new(FuelAllocationApi::new(
            store.clone(),
            allocation_engine.clone(),
            reconciliation.clone(),
        ));

        tracing::info!("AppState初始化完成");

        Ok(Self {
            db_path,
            store,
            config_manager,
            allocation_engine,
            reconciliation,
            fuel_allocation_api,
        })
    }
}

/// 获取默认数据库路径
///
/// 优先级: FUEL_LEDGER_DB_PATH 环境变量 > 用户数据目录 > ./fuel_ledger.db
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    // 允许通过环境变量显式指定 DB 路径（便于调试/测试/CI）
    if let Ok(path) = std::env::var("FUEL_LEDGER_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./fuel_ledger.db");

    if let Some(data_dir) = dirs::data_dir() {
        // 开发环境使用独立目录，避免污染生产数据
        #[cfg(debug_assertions)]
        let dir = data_dir.join("fuel-ledger-dev");

        #[cfg(not(debug_assertions))]
        let dir = data_dir.join("fuel-ledger");

        // 目录创建失败时保留当前目录回退值
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("fuel_ledger.db");
        }
    }

    path.to_string_lossy().to_string()
}
