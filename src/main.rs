// ==========================================
// 船舶燃油核算系统 - 控制台入口
// ==========================================
// 用法:
//   fuel-ledger run                 增量分摊（仅未分摊消耗）
//   fuel-ledger run-full            全量分摊（删除并重建全部分摊）
//   fuel-ledger report              不一致报告
//   fuel-ledger recover full|cleanup
//   fuel-ledger summary [YYYY-MM]   按船/月汇总
//
// 数据库路径: FUEL_LEDGER_DB_PATH 环境变量，否则用户数据目录
// 日志格式: FUEL_LEDGER_LOG_FORMAT=json 输出 JSON 行，否则文本
// 结果以 JSON 输出到 stdout
// ==========================================

use anyhow::{anyhow, bail, Context, Result};
use fuel_ledger::app::{get_default_db_path, AppState};
use fuel_ledger::domain::{AllocationScope, RecoveryMode};
use serde::Serialize;

const USAGE: &str = "用法: fuel-ledger <run | run-full | report | recover full|cleanup | summary [YYYY-MM]>";

fn main() -> Result<()> {
    match std::env::var("FUEL_LEDGER_LOG_FORMAT").as_deref() {
        Ok("json") => fuel_ledger::logging::init_json(),
        _ => fuel_ledger::logging::init(),
    }

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = args.first().map(|s| s.as_str()).unwrap_or("");
    if command.is_empty() || command == "help" || command == "--help" {
        println!("{}", USAGE);
        return Ok(());
    }

    tracing::info!("{} v{}", fuel_ledger::APP_NAME, fuel_ledger::VERSION);

    let db_path = get_default_db_path();
    tracing::info!("使用数据库: {}", db_path);

    let state = AppState::new(db_path).map_err(|e| anyhow!(e))?;
    let api = &state.fuel_allocation_api;

    match command {
        "run" => {
            let result = api.run_allocation(AllocationScope::Unallocated);
            print_json(&result)?;
            exit_on_failure(result.success);
        }
        "run-full" => {
            let result = api.run_allocation(AllocationScope::All);
            print_json(&result)?;
            exit_on_failure(result.success);
        }
        "report" => {
            let report = api.get_inconsistency_report().context("生成不一致报告失败")?;
            print_json(&report)?;
        }
        "recover" => {
            let mode = args
                .get(1)
                .and_then(|m| RecoveryMode::parse(m))
                .ok_or_else(|| anyhow!("recover 需要模式参数: full | cleanup"))?;
            let result = api.recover(mode);
            print_json(&result)?;
            exit_on_failure(result.success);
        }
        "summary" => {
            let month = args.get(1).map(|s| s.as_str());
            let summary = api.monthly_summary(month).context("月度汇总失败")?;
            print_json(&summary)?;
        }
        other => bail!("未知命令: {}\n{}", other, USAGE),
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("结果序列化失败")?;
    println!("{}", text);
    Ok(())
}

fn exit_on_failure(success: bool) {
    if !success {
        std::process::exit(1);
    }
}
