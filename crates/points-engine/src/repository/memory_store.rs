//! 内存仓储实现
//!
//! 适用于测试和本地试运行。事务语义为可串行化：
//! `begin` 获取全局锁并复制一份工作副本，`commit` 写回，drop 或 `rollback` 丢弃。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::traits::{LedgerQueryRepository, PointsStore, ReferenceDataRepository, UnitOfWork};
use crate::error::{PointsError, Result};
use crate::models::{
    AwardRecord, Badge, LedgerReconciliation, Milestone, MonthlySummary, User, UserBadgeGrant,
};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    users: HashMap<String, User>,
    awards: Vec<AwardRecord>,
    badges: HashMap<String, Badge>,
    milestones: Vec<Milestone>,
    grants: Vec<UserBadgeGrant>,
}

impl MemoryState {
    fn has_grant(&self, user_id: &str, badge_id: &str) -> bool {
        self.grants
            .iter()
            .any(|g| g.user_id == user_id && g.badge_id == badge_id)
    }

    fn sorted_milestones<'a>(milestones: impl Iterator<Item = &'a Milestone>) -> Vec<Milestone> {
        let mut result: Vec<Milestone> = milestones.cloned().collect();
        result.sort_by(|a, b| {
            a.points_required
                .cmp(&b.points_required)
                .then_with(|| a.title.cmp(&b.title))
                .then_with(|| a.id.cmp(&b.id))
        });
        result
    }
}

/// 内存积分存储
#[derive(Clone, Default)]
pub struct MemoryPointsStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryPointsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 写入或覆盖用户（用户由认证子系统维护，这里只用于预置数据）
    pub async fn insert_user(&self, user: User) {
        let mut state = self.state.lock().await;
        state.users.insert(user.id.clone(), user);
    }

    /// 全部流水条数
    pub async fn award_count(&self) -> usize {
        self.state.lock().await.awards.len()
    }

    /// 全部授予记录条数
    pub async fn grant_count(&self) -> usize {
        self.state.lock().await.grants.len()
    }
}

/// 内存工作单元
pub struct MemoryUnitOfWork {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

#[async_trait]
impl PointsStore for MemoryPointsStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryUnitOfWork { guard, working }))
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn get_user(&mut self, user_id: &str) -> Result<Option<User>> {
        Ok(self.working.users.get(user_id).cloned())
    }

    async fn apply_points_delta(&mut self, user_id: &str, delta: i64) -> Result<Option<User>> {
        let Some(user) = self.working.users.get_mut(user_id) else {
            return Ok(None);
        };

        // 与 PostgreSQL BIGINT 一致：溢出报错，不回绕
        let total = user.points_total;
        user.points_total = total.checked_add(delta).ok_or_else(|| {
            PointsError::Internal(format!(
                "points_total 超出 BIGINT 范围: user_id={}, total={}, delta={}",
                user_id, total, delta
            ))
        })?;
        Ok(Some(user.clone()))
    }

    async fn insert_award(&mut self, record: &AwardRecord) -> Result<()> {
        if !self.working.users.contains_key(&record.user_id) {
            return Err(PointsError::Internal(format!(
                "points_log.user_id 外键不满足: {}",
                record.user_id
            )));
        }
        self.working.awards.push(record.clone());
        Ok(())
    }

    async fn list_milestones_reached(&mut self, points_total: i64) -> Result<Vec<Milestone>> {
        Ok(MemoryState::sorted_milestones(
            self.working
                .milestones
                .iter()
                .filter(|m| m.points_required <= points_total),
        ))
    }

    async fn list_granted_badge_ids(&mut self, user_id: &str) -> Result<Vec<String>> {
        Ok(self
            .working
            .grants
            .iter()
            .filter(|g| g.user_id == user_id)
            .map(|g| g.badge_id.clone())
            .collect())
    }

    async fn insert_grant(&mut self, grant: &UserBadgeGrant) -> Result<()> {
        if self.working.has_grant(&grant.user_id, &grant.badge_id) {
            return Err(PointsError::DuplicateGrant {
                user_id: grant.user_id.clone(),
                badge_id: grant.badge_id.clone(),
            });
        }
        self.working.grants.push(grant.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let MemoryUnitOfWork { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl LedgerQueryRepository for MemoryPointsStore {
    async fn find_user(&self, user_id: &str) -> Result<Option<User>> {
        Ok(self.state.lock().await.users.get(user_id).cloned())
    }

    async fn list_awards(&self, user_id: &str, limit: i64) -> Result<Vec<AwardRecord>> {
        let state = self.state.lock().await;
        let limit = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);
        // 追加顺序即创建顺序
        Ok(state
            .awards
            .iter()
            .rev()
            .filter(|r| r.user_id == user_id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn monthly_summaries(&self, user_id: &str) -> Result<Vec<MonthlySummary>> {
        let state = self.state.lock().await;
        let mut by_month: HashMap<&str, (i64, i64)> = HashMap::new();
        for record in state.awards.iter().filter(|r| r.user_id == user_id) {
            let entry = by_month.entry(record.month.as_str()).or_default();
            entry.0 += record.delta;
            entry.1 += 1;
        }

        let mut summaries: Vec<MonthlySummary> = by_month
            .into_iter()
            .map(|(month, (total_delta, award_count))| MonthlySummary {
                user_id: user_id.to_string(),
                month: month.to_string(),
                total_delta,
                award_count,
            })
            .collect();
        summaries.sort_by(|a, b| b.month.cmp(&a.month));
        Ok(summaries)
    }

    async fn reconcile(&self, user_id: &str) -> Result<Option<LedgerReconciliation>> {
        let state = self.state.lock().await;
        let Some(user) = state.users.get(user_id) else {
            return Ok(None);
        };

        let (ledger_sum, award_count) = state
            .awards
            .iter()
            .filter(|r| r.user_id == user_id)
            .fold((0i64, 0i64), |(sum, count), r| (sum + r.delta, count + 1));

        Ok(Some(LedgerReconciliation {
            user_id: user_id.to_string(),
            points_total: user.points_total,
            ledger_sum,
            award_count,
        }))
    }

    async fn list_grants(&self, user_id: &str) -> Result<Vec<UserBadgeGrant>> {
        let state = self.state.lock().await;
        Ok(state
            .grants
            .iter()
            .filter(|g| g.user_id == user_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ReferenceDataRepository for MemoryPointsStore {
    async fn create_badge(&self, badge: &Badge) -> Result<()> {
        let mut state = self.state.lock().await;
        state.badges.insert(badge.id.clone(), badge.clone());
        Ok(())
    }

    async fn get_badge(&self, badge_id: &str) -> Result<Option<Badge>> {
        Ok(self.state.lock().await.badges.get(badge_id).cloned())
    }

    async fn create_milestone(&self, milestone: &Milestone) -> Result<()> {
        let mut state = self.state.lock().await;
        if let Some(badge_id) = &milestone.badge_id
            && !state.badges.contains_key(badge_id)
        {
            return Err(PointsError::BadgeNotFound(badge_id.clone()));
        }
        state.milestones.push(milestone.clone());
        Ok(())
    }

    async fn list_milestones(&self) -> Result<Vec<Milestone>> {
        let state = self.state.lock().await;
        Ok(MemoryState::sorted_milestones(state.milestones.iter()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_commit_persists_changes() {
        let store = MemoryPointsStore::new();
        store.insert_user(User::new("u-1", "Alice")).await;

        let mut uow = store.begin().await.unwrap();
        let user = uow.apply_points_delta("u-1", 30).await.unwrap().unwrap();
        assert_eq!(user.points_total, 30);
        uow.commit().await.unwrap();

        let user = store.find_user("u-1").await.unwrap().unwrap();
        assert_eq!(user.points_total, 30);
    }

    #[tokio::test]
    async fn test_drop_without_commit_rolls_back() {
        let store = MemoryPointsStore::new();
        store.insert_user(User::new("u-1", "Alice")).await;

        {
            let mut uow = store.begin().await.unwrap();
            uow.apply_points_delta("u-1", 30).await.unwrap();
            uow.insert_award(&AwardRecord::new("u-1", 30)).await.unwrap();
        }

        let user = store.find_user("u-1").await.unwrap().unwrap();
        assert_eq!(user.points_total, 0);
        assert_eq!(store.award_count().await, 0);
    }

    #[tokio::test]
    async fn test_apply_delta_unknown_user() {
        let store = MemoryPointsStore::new();
        let mut uow = store.begin().await.unwrap();
        assert!(uow.apply_points_delta("ghost", 5).await.unwrap().is_none());
        uow.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn test_apply_delta_overflow_fails_without_change() {
        let store = MemoryPointsStore::new();
        store.insert_user(User::new("u-1", "Alice")).await;

        let mut uow = store.begin().await.unwrap();
        uow.apply_points_delta("u-1", i64::MAX).await.unwrap();
        let err = uow.apply_points_delta("u-1", 1).await.unwrap_err();
        assert_eq!(err.error_code(), "INTERNAL_ERROR");

        // 失败的累加不改变工作副本
        let user = uow.get_user("u-1").await.unwrap().unwrap();
        assert_eq!(user.points_total, i64::MAX);
        uow.commit().await.unwrap();

        let mut uow = store.begin().await.unwrap();
        let user = uow.apply_points_delta("u-1", i64::MIN).await.unwrap().unwrap();
        assert_eq!(user.points_total, -1);
    }

    #[tokio::test]
    async fn test_duplicate_grant_rejected_within_transaction() {
        let store = MemoryPointsStore::new();
        store.insert_user(User::new("u-1", "Alice")).await;

        let mut uow = store.begin().await.unwrap();
        uow.insert_grant(&UserBadgeGrant::new("u-1", "b-1")).await.unwrap();
        let err = uow
            .insert_grant(&UserBadgeGrant::new("u-1", "b-1"))
            .await
            .unwrap_err();
        assert!(err.is_duplicate_grant());

        // 冲突后事务仍可继续使用
        uow.insert_grant(&UserBadgeGrant::new("u-1", "b-2")).await.unwrap();
        uow.commit().await.unwrap();
        assert_eq!(store.grant_count().await, 2);
    }

    #[tokio::test]
    async fn test_milestones_sorted_by_threshold() {
        let store = MemoryPointsStore::new();
        store.create_milestone(&Milestone::new("B", 100)).await.unwrap();
        store.create_milestone(&Milestone::new("A", 10)).await.unwrap();
        store.create_milestone(&Milestone::new("C", 50)).await.unwrap();

        let mut uow = store.begin().await.unwrap();
        let reached = uow.list_milestones_reached(60).await.unwrap();
        let titles: Vec<&str> = reached.iter().map(|m| m.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "C"]);
    }

    #[tokio::test]
    async fn test_milestone_requires_existing_badge() {
        let store = MemoryPointsStore::new();
        let err = store
            .create_milestone(&Milestone::new("Orphan", 10).with_badge("missing"))
            .await
            .unwrap_err();
        assert!(matches!(err, PointsError::BadgeNotFound(_)));
    }

    #[tokio::test]
    async fn test_monthly_summaries_group_by_month() {
        let store = MemoryPointsStore::new();
        store.insert_user(User::new("u-1", "Alice")).await;

        let mut uow = store.begin().await.unwrap();
        let mut march = AwardRecord::new("u-1", 20);
        march.month = "2024-03".to_string();
        let mut april_a = AwardRecord::new("u-1", 5);
        april_a.month = "2024-04".to_string();
        let mut april_b = AwardRecord::new("u-1", -2);
        april_b.month = "2024-04".to_string();
        for record in [&march, &april_a, &april_b] {
            uow.insert_award(record).await.unwrap();
        }
        uow.commit().await.unwrap();

        let summaries = store.monthly_summaries("u-1").await.unwrap();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].month, "2024-04");
        assert_eq!(summaries[0].total_delta, 3);
        assert_eq!(summaries[0].award_count, 2);
        assert_eq!(summaries[1].total_delta, 20);
    }
}
