use serde::{Deserialize, Serialize};

use crate::models::AwardRecord;
use crate::notification::NotificationEvent;

/// 积分发放请求
///
/// delta 可正可负，也允许为 0（只留痕不改总额）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwardPointsRequest {
    pub user_id: String,
    pub delta: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub granted_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_id: Option<String>,
}

impl AwardPointsRequest {
    pub fn new(user_id: impl Into<String>, delta: i64) -> Self {
        Self {
            user_id: user_id.into(),
            delta,
            granted_by: None,
            reason: None,
            activity_id: None,
        }
    }

    pub fn with_granted_by(mut self, granted_by: impl Into<String>) -> Self {
        self.granted_by = Some(granted_by.into());
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_activity(mut self, activity_id: impl Into<String>) -> Self {
        self.activity_id = Some(activity_id.into());
        self
    }

    /// 转换为待写入的流水记录
    pub(crate) fn into_record(self) -> AwardRecord {
        AwardRecord::new(self.user_id, self.delta)
            .with_granted_by(self.granted_by)
            .with_reason(self.reason)
            .with_activity(self.activity_id)
    }
}

/// 一次发放的结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AwardOutcome {
    pub record: AwardRecord,
    /// 累加后的积分总额
    pub new_total: i64,
    /// 用户所在楼层，用于排行榜通知
    pub floor_id: Option<String>,
}

impl AwardOutcome {
    /// 提交后需要发送的通知：个人积分变动，以及有楼层时的排行榜变动
    pub fn notifications(&self) -> Vec<NotificationEvent> {
        let mut events = vec![NotificationEvent::PointsAwarded {
            user_id: self.record.user_id.clone(),
            delta: self.record.delta,
            new_total: self.new_total,
            reason: self.record.reason.clone(),
        }];

        if let Some(floor_id) = &self.floor_id {
            events.push(NotificationEvent::LeaderboardUpdate {
                floor_id: floor_id.clone(),
                user_id: self.record.user_id.clone(),
                new_total: self.new_total,
            });
        }

        events
    }
}
