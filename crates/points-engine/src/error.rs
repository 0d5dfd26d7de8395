//! 积分引擎错误类型
//!
//! 定义服务层的业务错误和系统错误

use points_shared::error::SharedError;
use thiserror::Error;

/// 积分引擎错误类型
#[derive(Debug, Error)]
pub enum PointsError {
    // === 业务错误 ===
    #[error("用户不存在: {0}")]
    UserNotFound(String),

    #[error("徽章不存在: {0}")]
    BadgeNotFound(String),

    /// 并发评估时检测到的重复授予，由评估器就地吸收
    #[error("徽章已授予: user_id={user_id}, badge_id={badge_id}")]
    DuplicateGrant { user_id: String, badge_id: String },

    /// 通知发布失败，由分发器就地吸收
    #[error("通知发布失败: {0}")]
    NotificationDelivery(String),

    #[error("参数校验失败: {0}")]
    Validation(String),

    // === 系统错误 ===
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JSON 序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Redis 错误: {0}")]
    Redis(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

/// 积分引擎 Result 类型别名
pub type Result<T> = std::result::Result<T, PointsError>;

impl From<SharedError> for PointsError {
    fn from(err: SharedError) -> Self {
        match err {
            SharedError::Database(e) => Self::Database(e),
            SharedError::Serialization(e) => Self::Serialization(e),
            SharedError::Redis(e) => Self::Redis(e.to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl PointsError {
    /// 是否为重复授予（唯一约束命中）
    pub fn is_duplicate_grant(&self) -> bool {
        matches!(self, Self::DuplicateGrant { .. })
    }

    /// 检查是否为业务错误（非系统错误）
    pub fn is_business_error(&self) -> bool {
        matches!(
            self,
            Self::UserNotFound(_)
                | Self::BadgeNotFound(_)
                | Self::DuplicateGrant { .. }
                | Self::Validation(_)
        )
    }

    /// 获取错误码（用于 API 响应）
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::UserNotFound(_) => "USER_NOT_FOUND",
            Self::BadgeNotFound(_) => "BADGE_NOT_FOUND",
            Self::DuplicateGrant { .. } => "DUPLICATE_GRANT",
            Self::NotificationDelivery(_) => "NOTIFICATION_DELIVERY_FAILED",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Redis(_) => "REDIS_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}
