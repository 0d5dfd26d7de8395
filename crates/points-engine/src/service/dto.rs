//! 服务层数据传输对象

use serde::{Deserialize, Serialize};

use crate::models::{AwardRecord, Milestone};

/// 发放并评估的汇总结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AwardSummary {
    pub record: AwardRecord,
    pub new_total: i64,
    /// 本次发放后新解锁的里程碑
    pub unlocked: Vec<Milestone>,
}

/// 创建徽章请求
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBadgeRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub icon_url: Option<String>,
}

/// 创建里程碑请求
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMilestoneRequest {
    pub title: String,
    pub points_required: i64,
    #[serde(default)]
    pub badge_id: Option<String>,
}
