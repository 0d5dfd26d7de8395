//! 积分流水相关实体定义
//!
//! 包含只追加的积分流水、按月汇总和账本核对结果

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 月份分桶格式（YYYY-MM，UTC）
pub fn month_bucket(at: DateTime<Utc>) -> String {
    at.format("%Y-%m").to_string()
}

/// 积分流水
///
/// 每次积分变动追加一条，创建后不可修改或删除。
/// delta 带符号，允许负数扣分和 0 分的空操作记录。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AwardRecord {
    pub id: String,
    pub user_id: String,
    pub delta: i64,
    #[sqlx(default)]
    pub reason: Option<String>,
    /// 发放人（操作者用户 ID）
    #[sqlx(default)]
    pub granted_by: Option<String>,
    /// 触发本次发放的活动 ID
    #[sqlx(default)]
    pub activity_id: Option<String>,
    pub created_at: DateTime<Utc>,
    /// 由 created_at 派生的月份分桶，用于周期汇总
    pub month: String,
}

impl AwardRecord {
    /// 创建新的流水记录，ID 使用时间有序的 UUIDv7
    pub fn new(user_id: impl Into<String>, delta: i64) -> Self {
        let created_at = Utc::now();
        Self {
            id: Uuid::now_v7().to_string(),
            user_id: user_id.into(),
            delta,
            reason: None,
            granted_by: None,
            activity_id: None,
            month: month_bucket(created_at),
            created_at,
        }
    }

    pub fn with_reason(mut self, reason: Option<String>) -> Self {
        self.reason = reason;
        self
    }

    pub fn with_granted_by(mut self, granted_by: Option<String>) -> Self {
        self.granted_by = granted_by;
        self
    }

    pub fn with_activity(mut self, activity_id: Option<String>) -> Self {
        self.activity_id = activity_id;
        self
    }

    /// 是否为扣分记录
    pub fn is_penalty(&self) -> bool {
        self.delta < 0
    }
}

/// 按月汇总
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MonthlySummary {
    pub user_id: String,
    pub month: String,
    pub total_delta: i64,
    pub award_count: i64,
}

/// 账本核对结果
///
/// 流水是事实来源，points_total 是缓存，两者必须一致
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerReconciliation {
    pub user_id: String,
    pub points_total: i64,
    pub ledger_sum: i64,
    pub award_count: i64,
}

impl LedgerReconciliation {
    pub fn is_consistent(&self) -> bool {
        self.points_total == self.ledger_sum
    }

    /// points_total 相对流水之和的偏差
    pub fn drift(&self) -> i64 {
        self.points_total - self.ledger_sum
    }
}
