// ==========================================
// 物流托盘预约系统 - 引擎层错误类型
// ==========================================
// 红线: 所有校验先于写入；任一错误整笔事务回滚
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 预约引擎错误
#[derive(Error, Debug)]
pub enum BookingError {
    #[error("{entity}不存在: id={id}")]
    NotFound { entity: String, id: String },

    #[error("预约明细已存在: appointment_id={appointment_id}, shipment_line_id={shipment_line_id}")]
    DuplicateReservation {
        appointment_id: String,
        shipment_line_id: String,
    },

    #[error("超出可预约容量: shipment_line_id={shipment_line_id}, requested={requested}, 上限={max_allowed}")]
    CapacityExceeded {
        shipment_line_id: String,
        requested: i64,
        max_allowed: i64,
    },

    #[error("拒收托数不能大于预约托数: rejected={rejected_units}, reserved={reserved_units}")]
    InvalidRejection {
        reserved_units: i64,
        rejected_units: i64,
    },

    #[error("批量转移预约不一致: {0}")]
    CrossAppointmentMismatch(String),

    #[error("输入参数错误: {0}")]
    InvalidInput(String),

    #[error("批量条数超限: count={count}, max={max}")]
    BatchLimitExceeded { count: usize, max: usize },

    #[error(transparent)]
    Repository(RepositoryError),
}

impl BookingError {
    pub fn not_found(entity: &str, id: &str) -> Self {
        BookingError::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }

    /// 存储层故障（忙/锁/IO），整笔重试安全
    pub fn is_retryable(&self) -> bool {
        matches!(self, BookingError::Repository(e) if e.is_storage_failure())
    }
}

impl From<RepositoryError> for BookingError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => BookingError::NotFound { entity, id },
            other => BookingError::Repository(other),
        }
    }
}

impl From<rusqlite::Error> for BookingError {
    fn from(err: rusqlite::Error) -> Self {
        RepositoryError::from(err).into()
    }
}

/// Result 类型别名
pub type BookingResult<T> = Result<T, BookingError>;
