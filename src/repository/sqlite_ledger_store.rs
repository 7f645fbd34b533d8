// ==========================================
// 船舶燃油核算系统 - SQLite 账本存储
// ==========================================
// 依据: fuel_allocation / purchase_lot / consumption_record 三表
// 红线: 所有写入在单事务内完成
// ==========================================

mod core;
mod queries;
mod writes;


pub use core::SqliteLedgerStore;
