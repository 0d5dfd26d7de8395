//! 通知事件定义
//!
//! 事件以 JSON 发布，`type` 字段区分事件类型，字段名与下游推送服务约定为 snake_case。

use serde::{Deserialize, Serialize};

use points_shared::pubsub::Channel;

/// 实时通知事件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum NotificationEvent {
    /// 积分变动，发往用户个人频道
    #[serde(rename = "points.awarded")]
    PointsAwarded {
        user_id: String,
        delta: i64,
        new_total: i64,
        reason: Option<String>,
    },

    /// 排行榜变动，发往用户所在楼层频道
    #[serde(rename = "leaderboard.update")]
    LeaderboardUpdate {
        floor_id: String,
        user_id: String,
        new_total: i64,
    },

    /// 里程碑解锁，发往用户个人频道
    #[serde(rename = "milestone.unlocked")]
    MilestoneUnlocked {
        user_id: String,
        milestone_id: String,
        badge_id: String,
        title: String,
    },
}

impl NotificationEvent {
    /// 事件类型标识（与 JSON 中的 type 字段一致）
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::PointsAwarded { .. } => "points.awarded",
            Self::LeaderboardUpdate { .. } => "leaderboard.update",
            Self::MilestoneUnlocked { .. } => "milestone.unlocked",
        }
    }

    /// 发布目标频道
    pub fn channel(&self) -> String {
        match self {
            Self::PointsAwarded { user_id, .. } | Self::MilestoneUnlocked { user_id, .. } => {
                Channel::user_notifications(user_id)
            }
            Self::LeaderboardUpdate { floor_id, .. } => Channel::floor_leaderboard(floor_id),
        }
    }

    pub fn user_id(&self) -> &str {
        match self {
            Self::PointsAwarded { user_id, .. }
            | Self::LeaderboardUpdate { user_id, .. }
            | Self::MilestoneUnlocked { user_id, .. } => user_id,
        }
    }
}
