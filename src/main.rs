// ==========================================
// 物流托盘预约系统 - 对账命令行入口
// ==========================================
// 用法: pallet-booking [db_path] [--repair] [--json-log]
// 退出码: 0 账本一致（或已修复）；1 发现偏差未修复；2 运行失败
// ==========================================

use pallet_booking::app::{get_default_db_path, AppState};
use pallet_booking::logging;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let repair = args.iter().any(|a| a == "--repair");
    let json_log = args.iter().any(|a| a == "--json-log");
    let db_path = args
        .iter()
        .find(|a| !a.starts_with("--"))
        .cloned()
        .unwrap_or_else(get_default_db_path);

    if json_log {
        logging::init_json();
    } else {
        logging::init();
    }

    tracing::info!("==================================================");
    tracing::info!("{} - 账本对账", pallet_booking::APP_NAME);
    tracing::info!("系统版本: {}", pallet_booking::VERSION);
    tracing::info!("==================================================");
    tracing::info!("使用数据库: {}", db_path);

    let app_state = match AppState::new(db_path) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("无法初始化AppState: {}", e);
            return ExitCode::from(2);
        }
    };

    let operator = std::env::var("PALLET_BOOKING_OPERATOR").unwrap_or_else(|_| "reconcile-cli".to_string());
    match app_state.ledger_audit_api.reconcile_ledger(repair, &operator) {
        Ok(report) => {
            match serde_json::to_string_pretty(&report) {
                Ok(json) => println!("{}", json),
                Err(e) => tracing::warn!("对账报告序列化失败: {}", e),
            }
            if report.is_consistent() || report.repaired {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            }
        }
        Err(e) => {
            println!("{}", e.to_response().to_json());
            ExitCode::from(2)
        }
    }
}
