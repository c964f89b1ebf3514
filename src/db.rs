// ==========================================
// 物流托盘预约系统 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为，避免“部分连接外键开启/部分不开启”
// - 统一 busy_timeout，写事务排队等待而不是立即报 busy
// - 统一建表语句（幂等），测试与二进制共用同一份 schema
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 3;

/// 时间戳统一格式（与 action_log / appointment 等表的 TEXT 字段对齐）
pub const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
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

/// 初始化数据库 schema（幂等）
///
/// 约束落在库里的部分：
/// - reservation_line (appointment_id, shipment_line_id) 唯一
/// - 0 <= rejected_units <= reserved_units
/// - physical_lot 每个 shipment_line 至多一条
///
/// 可用量计数器（remaining_units / available_units）不加非负约束：
/// 实物批次晚于预约到达且点数偏少时，计数器为负即代表超占，由对账报告暴露。
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

        CREATE TABLE IF NOT EXISTS shipment_line (
            shipment_line_id TEXT PRIMARY KEY,
            order_id TEXT NOT NULL,
            destination TEXT,
            declared_units INTEGER NOT NULL DEFAULT 0 CHECK (declared_units >= 0),
            remaining_units INTEGER NOT NULL DEFAULT 0,
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_shipment_line_order ON shipment_line(order_id);

        CREATE TABLE IF NOT EXISTS physical_lot (
            lot_id TEXT PRIMARY KEY,
            shipment_line_id TEXT NOT NULL UNIQUE
                REFERENCES shipment_line(shipment_line_id),
            warehouse_code TEXT,
            counted_units INTEGER NOT NULL DEFAULT 0 CHECK (counted_units >= 0),
            available_units INTEGER NOT NULL DEFAULT 0,
            received_at TEXT,
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS appointment (
            appointment_id TEXT PRIMARY KEY,
            reference_code TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'SCHEDULED',
            scheduled_at TEXT,
            total_units INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            updated_by TEXT
        );

        CREATE TABLE IF NOT EXISTS reservation_line (
            reservation_id TEXT PRIMARY KEY,
            appointment_id TEXT NOT NULL REFERENCES appointment(appointment_id),
            shipment_line_id TEXT NOT NULL REFERENCES shipment_line(shipment_line_id),
            reserved_units INTEGER NOT NULL,
            rejected_units INTEGER NOT NULL DEFAULT 0,
            capacity_snapshot INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            created_by TEXT,
            updated_at TEXT NOT NULL,
            updated_by TEXT,
            UNIQUE (appointment_id, shipment_line_id),
            CHECK (reserved_units >= 0 AND rejected_units >= 0 AND rejected_units <= reserved_units)
        );
        CREATE INDEX IF NOT EXISTS idx_reservation_line_shipment
            ON reservation_line(shipment_line_id);

        CREATE TABLE IF NOT EXISTS appointment_dispatch_task (
            task_id TEXT PRIMARY KEY,
            appointment_id TEXT NOT NULL REFERENCES appointment(appointment_id),
            task_type TEXT NOT NULL,
            payload_json TEXT,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_dispatch_task_appointment
            ON appointment_dispatch_task(appointment_id);

        CREATE TABLE IF NOT EXISTS order_booking_summary (
            order_id TEXT PRIMARY KEY,
            line_count INTEGER NOT NULL,
            appointment_count INTEGER NOT NULL,
            reserved_units INTEGER NOT NULL,
            effective_units INTEGER NOT NULL,
            synced_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS action_log (
            action_id TEXT PRIMARY KEY,
            action_type TEXT NOT NULL,
            action_ts TEXT NOT NULL,
            actor TEXT NOT NULL,
            appointment_id TEXT,
            payload_json TEXT,
            detail TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_action_log_appointment ON action_log(appointment_id);
        CREATE INDEX IF NOT EXISTS idx_action_log_ts ON action_log(action_ts);
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();

        assert_eq!(read_schema_version(&conn).unwrap(), None);

        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();

        assert_eq!(read_schema_version(&conn).unwrap(), Some(CURRENT_SCHEMA_VERSION));
    }

    #[test]
    fn test_rejected_units_check_constraint() {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        init_schema(&conn).unwrap();

        conn.execute_batch(
            r#"
            INSERT INTO shipment_line (shipment_line_id, order_id, declared_units, remaining_units)
                VALUES ('SL1', 'ORD1', 10, 10);
            INSERT INTO appointment (appointment_id, reference_code, created_at, updated_at)
                VALUES ('A1', 'APT-1', '2026-01-01 00:00:00', '2026-01-01 00:00:00');
            "#,
        )
        .unwrap();

        let result = conn.execute(
            r#"INSERT INTO reservation_line (
                reservation_id, appointment_id, shipment_line_id,
                reserved_units, rejected_units, capacity_snapshot, created_at, updated_at
            ) VALUES ('R1', 'A1', 'SL1', 2, 3, 10, '2026-01-01 00:00:00', '2026-01-01 00:00:00')"#,
            [],
        );

        assert!(result.is_err(), "rejected_units > reserved_units 应被 CHECK 拒绝");
    }
}
