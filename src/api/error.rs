// ==========================================
// 物流托盘预约系统 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型，把引擎/仓储错误转换为调用方可识别的错误
// 约定: 每个错误都带显式原因；code() 提供稳定的机器码
// ==========================================

use crate::engine::error::BookingError;
use crate::repository::error::RepositoryError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 业务规则错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("预约明细已存在: appointment_id={appointment_id}, shipment_line_id={shipment_line_id}")]
    DuplicateReservation {
        appointment_id: String,
        shipment_line_id: String,
    },

    #[error("超出可预约容量: shipment_line_id={shipment_line_id}, requested={requested}, 最多还可预约{max_allowed}托")]
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

    #[error("批量条数超限: count={count}, max={max}")]
    BatchLimitExceeded { count: usize, max: usize },

    #[error("业务规则违反: {0}")]
    BusinessRuleViolation(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    /// 存储层故障，事务已整体回滚，可重试
    #[error("事务失败(已回滚，可重试): {0}")]
    TransactionFailure(String),

    #[error("数据库错误: {0}")]
    DatabaseError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ApiError {
    /// 稳定的机器码
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidInput(_) => "INVALID_INPUT",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::DuplicateReservation { .. } => "DUPLICATE_RESERVATION",
            ApiError::CapacityExceeded { .. } => "CAPACITY_EXCEEDED",
            ApiError::InvalidRejection { .. } => "INVALID_REJECTION",
            ApiError::CrossAppointmentMismatch(_) => "CROSS_APPOINTMENT_MISMATCH",
            ApiError::BatchLimitExceeded { .. } => "BATCH_LIMIT_EXCEEDED",
            ApiError::BusinessRuleViolation(_) => "BUSINESS_RULE_VIOLATION",
            ApiError::TransactionFailure(_) => "TRANSACTION_FAILURE",
            ApiError::DatabaseError(_) => "DATABASE_ERROR",
            ApiError::InternalError(_) => "INTERNAL_ERROR",
            ApiError::Other(_) => "OTHER_ERROR",
        }
    }

    /// 调用方可原样重试
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::TransactionFailure(_))
    }

    /// 转换为对外错误响应
    pub fn to_response(&self) -> ErrorResponse {
        let details = match self {
            ApiError::CapacityExceeded {
                shipment_line_id,
                requested,
                max_allowed,
            } => Some(serde_json::json!({
                "shipment_line_id": shipment_line_id,
                "requested": requested,
                "max_allowed": max_allowed,
            })),
            ApiError::DuplicateReservation {
                appointment_id,
                shipment_line_id,
            } => Some(serde_json::json!({
                "appointment_id": appointment_id,
                "shipment_line_id": shipment_line_id,
            })),
            ApiError::InvalidRejection {
                reserved_units,
                rejected_units,
            } => Some(serde_json::json!({
                "reserved_units": reserved_units,
                "rejected_units": rejected_units,
            })),
            ApiError::BatchLimitExceeded { count, max } => {
                Some(serde_json::json!({ "count": count, "max": max }))
            }
            ApiError::TransactionFailure(_) => Some(serde_json::json!({ "retryable": true })),
            _ => None,
        };

        ErrorResponse {
            code: self.code().to_string(),
            message: self.to_string(),
            details,
        }
    }
}

// ==========================================
// 错误响应（JSON）
// ==========================================

/// 错误响应结构
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// 错误代码
    pub code: String,

    /// 错误消息
    pub message: String,

    /// 详细信息（可选）
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    /// 序列化为JSON字符串
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(r#"{{"code":"{}","message":"错误序列化失败","details":null}}"#, self.code)
        })
    }
}

// ==========================================
// 从 RepositoryError 转换
// 目的: 将Repository层的技术错误转换为调用方可处理的错误
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        if err.is_storage_failure() {
            return ApiError::TransactionFailure(err.to_string());
        }

        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("外键约束违反: {}", msg))
            }
            RepositoryError::CheckConstraintViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("检查约束违反: {}", msg))
            }
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InvalidInput(format!("字段{}错误: {}", field, message))
            }
            RepositoryError::InternalError(msg) => ApiError::InternalError(msg),
            RepositoryError::Other(err) => ApiError::Other(err),
            other => ApiError::DatabaseError(other.to_string()),
        }
    }
}

// ==========================================
// 从 BookingError 转换
// ==========================================
impl From<BookingError> for ApiError {
    fn from(err: BookingError) -> Self {
        match err {
            BookingError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            BookingError::DuplicateReservation {
                appointment_id,
                shipment_line_id,
            } => ApiError::DuplicateReservation {
                appointment_id,
                shipment_line_id,
            },
            BookingError::CapacityExceeded {
                shipment_line_id,
                requested,
                max_allowed,
            } => ApiError::CapacityExceeded {
                shipment_line_id,
                requested,
                max_allowed,
            },
            BookingError::InvalidRejection {
                reserved_units,
                rejected_units,
            } => ApiError::InvalidRejection {
                reserved_units,
                rejected_units,
            },
            BookingError::CrossAppointmentMismatch(msg) => ApiError::CrossAppointmentMismatch(msg),
            BookingError::InvalidInput(msg) => ApiError::InvalidInput(msg),
            BookingError::BatchLimitExceeded { count, max } => ApiError::BatchLimitExceeded { count, max },
            BookingError::Repository(err) => err.into(),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;
