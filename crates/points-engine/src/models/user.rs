//! 用户实体
//!
//! 用户归属认证/资料子系统，积分引擎只读取身份、分组并维护 points_total

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 用户
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    /// 所属楼层（排行榜分组），可为空
    #[sqlx(default)]
    pub floor_id: Option<String>,
    /// 反规范化的积分总额，等于该用户全部流水 delta 之和
    ///
    /// 扣分可使其低于 0，不做截断
    pub points_total: i64,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            floor_id: None,
            points_total: 0,
            created_at: Utc::now(),
        }
    }

    pub fn with_floor(mut self, floor_id: impl Into<String>) -> Self {
        self.floor_id = Some(floor_id.into());
        self
    }
}
