//! 账本查询服务
//!
//! 只读操作，直接读取已提交数据，不参与写路径事务。

use std::sync::Arc;

use tracing::{instrument, warn};

use crate::error::{PointsError, Result};
use crate::models::{AwardRecord, LedgerReconciliation, MonthlySummary, UserBadgeGrant};
use crate::repository::LedgerQueryRepository;

/// 历史流水默认和最大返回条数
pub const DEFAULT_HISTORY_LIMIT: i64 = 50;
pub const MAX_HISTORY_LIMIT: i64 = 500;

/// 账本查询服务
#[derive(Clone)]
pub struct LedgerQueryService {
    repo: Arc<dyn LedgerQueryRepository>,
}

impl LedgerQueryService {
    pub fn new(repo: Arc<dyn LedgerQueryRepository>) -> Self {
        Self { repo }
    }

    /// 最近的积分流水，按时间倒序；limit 截断到 [1, MAX_HISTORY_LIMIT]
    #[instrument(skip(self))]
    pub async fn history(&self, user_id: &str, limit: i64) -> Result<Vec<AwardRecord>> {
        self.ensure_user(user_id).await?;
        self.repo
            .list_awards(user_id, limit.clamp(1, MAX_HISTORY_LIMIT))
            .await
    }

    /// 按月汇总，最近的月份在前
    #[instrument(skip(self))]
    pub async fn monthly_summaries(&self, user_id: &str) -> Result<Vec<MonthlySummary>> {
        self.ensure_user(user_id).await?;
        self.repo.monthly_summaries(user_id).await
    }

    /// 核对 points_total 与流水之和
    ///
    /// 不一致时记录告警日志，但仍返回核对结果
    #[instrument(skip(self))]
    pub async fn reconcile(&self, user_id: &str) -> Result<LedgerReconciliation> {
        let reconciliation = self
            .repo
            .reconcile(user_id)
            .await?
            .ok_or_else(|| PointsError::UserNotFound(user_id.to_string()))?;

        if !reconciliation.is_consistent() {
            warn!(
                points_total = reconciliation.points_total,
                ledger_sum = reconciliation.ledger_sum,
                drift = reconciliation.drift(),
                "积分总额与流水之和不一致"
            );
        }

        Ok(reconciliation)
    }

    /// 用户已获得的徽章
    #[instrument(skip(self))]
    pub async fn user_badges(&self, user_id: &str) -> Result<Vec<UserBadgeGrant>> {
        self.ensure_user(user_id).await?;
        self.repo.list_grants(user_id).await
    }

    async fn ensure_user(&self, user_id: &str) -> Result<()> {
        match self.repo.find_user(user_id).await? {
            Some(_) => Ok(()),
            None => Err(PointsError::UserNotFound(user_id.to_string())),
        }
    }
}
