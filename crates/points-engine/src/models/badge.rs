//! 徽章与里程碑实体定义
//!
//! Badge 和 Milestone 是静态参考数据；UserBadgeGrant 记录用户解锁的徽章，
//! 每个 (user_id, badge_id) 至多一条。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 徽章定义
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Badge {
    pub id: String,
    pub name: String,
    #[sqlx(default)]
    pub description: Option<String>,
    /// 图标 URL
    #[sqlx(default)]
    pub icon_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Badge {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            description: None,
            icon_url: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    pub fn with_icon_url(mut self, icon_url: Option<String>) -> Self {
        self.icon_url = icon_url;
        self
    }
}

/// 里程碑
///
/// 积分总额达到 points_required 时授予关联徽章；未关联徽章的里程碑不产生授予。
/// 多个里程碑可以共享同一阈值或同一徽章。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Milestone {
    pub id: String,
    pub title: String,
    pub points_required: i64,
    #[sqlx(default)]
    pub badge_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Milestone {
    pub fn new(title: impl Into<String>, points_required: i64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            points_required,
            badge_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_badge(mut self, badge_id: impl Into<String>) -> Self {
        self.badge_id = Some(badge_id.into());
        self
    }

    /// 给定积分总额是否达到阈值
    pub fn is_reached(&self, points_total: i64) -> bool {
        points_total >= self.points_required
    }
}

/// 用户徽章授予记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserBadgeGrant {
    pub id: String,
    pub user_id: String,
    pub badge_id: String,
    pub awarded_at: DateTime<Utc>,
}

impl UserBadgeGrant {
    pub fn new(user_id: impl Into<String>, badge_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            badge_id: badge_id.into(),
            awarded_at: Utc::now(),
        }
    }
}
