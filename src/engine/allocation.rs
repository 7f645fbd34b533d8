// ==========================================
// 船舶燃油核算系统 - FIFO 分摊引擎
// ==========================================
// 职责: 将消耗记录按采购批次先进先出分摊，计算分摊金额
// 红线: 一次运行 = 一次提交（全部成功或全部回滚）
// 红线: 批次仅与同船消耗匹配
// ==========================================

mod core;
pub mod matching;

#[cfg(test)]
mod tests;

pub use core::AllocationEngine;
pub use matching::{match_record, LotWorkingSet, RecordMatch};
