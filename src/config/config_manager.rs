// ==========================================
// 物流托盘预约系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::booking_config_trait::{BookingConfigReader, BATCH_CREATE_HARD_LIMIT};
use crate::db::open_sqlite_connection;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::json;
use std::collections::BTreeMap;
use std::error::Error;
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

        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;

        Ok(value)
    }

    /// 读取 global scope 的配置值（公开方法，供其他模块复用）
    pub fn get_global_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        self.get_config_value(key)
    }

    /// 从 config_kv 表读取配置值，带默认值
    fn get_config_or_default(&self, key: &str, default: &str) -> Result<String, Box<dyn Error>> {
        Ok(self.get_config_value(key)?.unwrap_or_else(|| default.to_string()))
    }

    /// 写入 global scope 配置（UPSERT）
    pub fn set_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value, updated_at) VALUES ('global', ?1, ?2, datetime('now'))
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;

        Ok(())
    }

    /// 获取所有配置的快照（JSON格式）
    ///
    /// # 用途
    /// - 运维排查时查看当前生效的配置
    pub fn get_config_snapshot(&self) -> Result<String, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt = conn.prepare(
            "SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key"
        )?;

        let mut config_map: BTreeMap<String, String> = BTreeMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        Ok(serde_json::to_string(&json!(config_map))?)
    }

    fn parse_usize_or(&self, key: &str, default: usize) -> Result<usize, Box<dyn Error>> {
        let value = self.get_config_or_default(key, &default.to_string())?;
        Ok(value.trim().parse::<usize>().unwrap_or_else(|_| {
            tracing::warn!(config_key = key, raw_value = %value, "配置值不是正整数，使用默认值");
            default
        }))
    }
}

// ==========================================
// BookingConfigReader Trait 实现
// ==========================================
impl BookingConfigReader for ConfigManager {
    fn get_batch_create_max_items(&self) -> Result<usize, Box<dyn Error>> {
        let value = self.parse_usize_or(config_keys::BATCH_CREATE_MAX_ITEMS, BATCH_CREATE_HARD_LIMIT)?;
        Ok(value.clamp(1, BATCH_CREATE_HARD_LIMIT))
    }

    fn get_batch_move_max_items(&self) -> Result<usize, Box<dyn Error>> {
        let value = self.parse_usize_or(config_keys::BATCH_MOVE_MAX_ITEMS, 200)?;
        Ok(value.max(1))
    }

    fn is_order_summary_sync_enabled(&self) -> Result<bool, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::ORDER_SUMMARY_SYNC_ENABLED, "true")?;
        Ok(!matches!(
            value.trim().to_lowercase().as_str(),
            "false" | "0" | "off" | "no"
        ))
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    pub const BATCH_CREATE_MAX_ITEMS: &str = "booking.batch_create_max_items";
    pub const BATCH_MOVE_MAX_ITEMS: &str = "booking.batch_move_max_items";
    pub const ORDER_SUMMARY_SYNC_ENABLED: &str = "booking.order_summary_sync_enabled";
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> ConfigManager {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_schema(&conn).unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn))).unwrap()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = setup();
        assert_eq!(config.get_batch_create_max_items().unwrap(), 50);
        assert_eq!(config.get_batch_move_max_items().unwrap(), 200);
        assert!(config.is_order_summary_sync_enabled().unwrap());
    }

    #[test]
    fn test_batch_create_limit_cannot_exceed_hard_ceiling() {
        let config = setup();

        config.set_value(config_keys::BATCH_CREATE_MAX_ITEMS, "500").unwrap();
        assert_eq!(config.get_batch_create_max_items().unwrap(), 50);

        config.set_value(config_keys::BATCH_CREATE_MAX_ITEMS, "20").unwrap();
        assert_eq!(config.get_batch_create_max_items().unwrap(), 20);

        config.set_value(config_keys::BATCH_CREATE_MAX_ITEMS, "abc").unwrap();
        assert_eq!(config.get_batch_create_max_items().unwrap(), 50);
    }

    #[test]
    fn test_sync_switch_and_snapshot() {
        let config = setup();
        config.set_value(config_keys::ORDER_SUMMARY_SYNC_ENABLED, "false").unwrap();
        assert!(!config.is_order_summary_sync_enabled().unwrap());

        let snapshot: serde_json::Value =
            serde_json::from_str(&config.get_config_snapshot().unwrap()).unwrap();
        assert_eq!(snapshot[config_keys::ORDER_SUMMARY_SYNC_ENABLED], "false");
    }
}
