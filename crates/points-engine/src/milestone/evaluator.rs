//! 里程碑评估器
//!
//! ## 评估规则
//!
//! - 候选：`points_required <= points_total` 的全部里程碑，按阈值、标题、ID 升序
//! - 未关联徽章的里程碑跳过
//! - 用户已持有的徽章跳过，每个徽章最多授予一次
//! - 多个里程碑共用一个徽章时，按顺序第一个解锁的里程碑生效
//! - 并发评估产生的重复授予由存储层唯一约束拒绝，评估器跳过该条继续
//! - 总额下降不会撤销已授予的徽章

use std::collections::HashSet;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, instrument};

use points_shared::observability::metrics::record_milestone_unlock;

use crate::error::Result;
use crate::models::{Milestone, UserBadgeGrant};
use crate::notification::NotificationEvent;
use crate::repository::UnitOfWork;

/// 一次评估的结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationOutcome {
    pub user_id: String,
    /// 本次新解锁的里程碑，按评估顺序
    pub unlocked: Vec<Milestone>,
}

impl EvaluationOutcome {
    fn empty(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            unlocked: Vec::new(),
        }
    }

    /// 每个新解锁的里程碑对应一条 `milestone.unlocked` 通知
    pub fn notifications(&self) -> Vec<NotificationEvent> {
        self.unlocked
            .iter()
            .filter_map(|milestone| {
                milestone
                    .badge_id
                    .as_ref()
                    .map(|badge_id| NotificationEvent::MilestoneUnlocked {
                        user_id: self.user_id.clone(),
                        milestone_id: milestone.id.clone(),
                        badge_id: badge_id.clone(),
                        title: milestone.title.clone(),
                    })
            })
            .collect()
    }
}

/// 里程碑评估器
#[derive(Debug, Clone, Copy, Default)]
pub struct MilestoneEvaluator;

impl MilestoneEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// 评估用户当前总额可解锁的里程碑并写入授予记录
    ///
    /// 用户不存在时返回空结果。事务的提交由调用方负责。
    #[instrument(skip(self, uow))]
    pub async fn evaluate_milestones(
        &self,
        uow: &mut dyn UnitOfWork,
        user_id: &str,
    ) -> Result<EvaluationOutcome> {
        let started = Instant::now();

        let Some(user) = uow.get_user(user_id).await? else {
            debug!("用户不存在，跳过里程碑评估");
            return Ok(EvaluationOutcome::empty(user_id));
        };

        let candidates = uow.list_milestones_reached(user.points_total).await?;
        if candidates.is_empty() {
            return Ok(EvaluationOutcome::empty(user_id));
        }

        let mut held: HashSet<String> = uow
            .list_granted_badge_ids(user_id)
            .await?
            .into_iter()
            .collect();

        let mut outcome = EvaluationOutcome::empty(user_id);
        for milestone in candidates {
            let Some(badge_id) = milestone.badge_id.as_deref() else {
                continue;
            };
            if held.contains(badge_id) {
                continue;
            }

            let grant = UserBadgeGrant::new(user_id, badge_id);
            match uow.insert_grant(&grant).await {
                Ok(()) => {}
                Err(e) if e.is_duplicate_grant() => {
                    // 另一评估已先行授予
                    debug!(badge_id = %badge_id, "徽章已被并发授予，跳过");
                    held.insert(badge_id.to_string());
                    continue;
                }
                Err(e) => return Err(e),
            }

            record_milestone_unlock(badge_id);
            held.insert(badge_id.to_string());
            outcome.unlocked.push(milestone);
        }

        if !outcome.unlocked.is_empty() {
            info!(
                points_total = user.points_total,
                unlocked_count = outcome.unlocked.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "里程碑解锁完成"
            );
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::error::PointsError;
    use crate::models::{AwardRecord, Badge, User};
    use crate::repository::{
        LedgerQueryRepository, MemoryPointsStore, PointsStore, ReferenceDataRepository,
    };

    async fn seeded_store(points_total: i64) -> MemoryPointsStore {
        let store = MemoryPointsStore::new();
        let mut user = User::new("u-1", "Alice");
        user.points_total = points_total;
        store.insert_user(user).await;
        store
    }

    async fn add_milestone(store: &MemoryPointsStore, title: &str, points: i64) -> Milestone {
        let badge = Badge::new(format!("{title} badge"));
        store.create_badge(&badge).await.unwrap();
        let milestone = Milestone::new(title, points).with_badge(badge.id.clone());
        store.create_milestone(&milestone).await.unwrap();
        milestone
    }

    async fn evaluate(store: &MemoryPointsStore) -> EvaluationOutcome {
        let mut uow = store.begin().await.unwrap();
        let outcome = MilestoneEvaluator::new()
            .evaluate_milestones(uow.as_mut(), "u-1")
            .await
            .unwrap();
        uow.commit().await.unwrap();
        outcome
    }

    #[tokio::test]
    async fn test_unlocks_reached_milestones_in_threshold_order() {
        let store = seeded_store(120).await;
        let gold = add_milestone(&store, "Gold", 100).await;
        let bronze = add_milestone(&store, "Bronze", 10).await;
        add_milestone(&store, "Platinum", 500).await;

        let outcome = evaluate(&store).await;
        assert_eq!(outcome.unlocked, vec![bronze, gold]);
        assert_eq!(outcome.notifications().len(), 2);
    }

    #[tokio::test]
    async fn test_second_evaluation_unlocks_nothing() {
        let store = seeded_store(60).await;
        add_milestone(&store, "Fifty", 50).await;

        assert_eq!(evaluate(&store).await.unlocked.len(), 1);
        assert!(evaluate(&store).await.unlocked.is_empty());
        assert_eq!(store.grant_count().await, 1);
    }

    #[tokio::test]
    async fn test_unknown_user_yields_empty_outcome() {
        let store = MemoryPointsStore::new();
        add_milestone(&store, "Zero", 0).await;

        let mut uow = store.begin().await.unwrap();
        let outcome = MilestoneEvaluator::new()
            .evaluate_milestones(uow.as_mut(), "ghost")
            .await
            .unwrap();
        assert!(outcome.unlocked.is_empty());
        assert_eq!(outcome.user_id, "ghost");
    }

    #[tokio::test]
    async fn test_milestone_without_badge_is_skipped() {
        let store = seeded_store(100).await;
        store
            .create_milestone(&Milestone::new("Badgeless", 10))
            .await
            .unwrap();

        assert!(evaluate(&store).await.unlocked.is_empty());
        assert_eq!(store.grant_count().await, 0);
    }

    #[tokio::test]
    async fn test_shared_badge_granted_once_first_milestone_wins() {
        let store = seeded_store(100).await;
        let badge = Badge::new("Shared");
        store.create_badge(&badge).await.unwrap();
        let early = Milestone::new("Early", 20).with_badge(badge.id.clone());
        let late = Milestone::new("Late", 80).with_badge(badge.id.clone());
        store.create_milestone(&late).await.unwrap();
        store.create_milestone(&early).await.unwrap();

        let outcome = evaluate(&store).await;
        assert_eq!(outcome.unlocked, vec![early]);
        assert_eq!(store.list_grants("u-1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_threshold_zero_unlocks_at_zero_points() {
        let store = seeded_store(0).await;
        add_milestone(&store, "Welcome", 0).await;

        assert_eq!(evaluate(&store).await.unlocked.len(), 1);
    }

    /// 模拟并发场景：预检查看不到其他事务刚写入的授予，插入时才被唯一约束拒绝
    struct RacingUnitOfWork {
        user: User,
        milestones: Vec<Milestone>,
        taken_by_other: HashSet<String>,
        inserted: Vec<UserBadgeGrant>,
    }

    #[async_trait]
    impl UnitOfWork for RacingUnitOfWork {
        async fn get_user(&mut self, user_id: &str) -> Result<Option<User>> {
            Ok((self.user.id == user_id).then(|| self.user.clone()))
        }

        async fn apply_points_delta(&mut self, _user_id: &str, _delta: i64) -> Result<Option<User>> {
            unreachable!("评估器不修改积分")
        }

        async fn insert_award(&mut self, _record: &AwardRecord) -> Result<()> {
            unreachable!("评估器不写流水")
        }

        async fn list_milestones_reached(&mut self, points_total: i64) -> Result<Vec<Milestone>> {
            Ok(self
                .milestones
                .iter()
                .filter(|m| m.points_required <= points_total)
                .cloned()
                .collect())
        }

        async fn list_granted_badge_ids(&mut self, _user_id: &str) -> Result<Vec<String>> {
            Ok(Vec::new())
        }

        async fn insert_grant(&mut self, grant: &UserBadgeGrant) -> Result<()> {
            if self.taken_by_other.contains(&grant.badge_id) {
                return Err(PointsError::DuplicateGrant {
                    user_id: grant.user_id.clone(),
                    badge_id: grant.badge_id.clone(),
                });
            }
            self.inserted.push(grant.clone());
            Ok(())
        }

        async fn commit(self: Box<Self>) -> Result<()> {
            Ok(())
        }

        async fn rollback(self: Box<Self>) -> Result<()> {
            Ok(())
        }
    }

    fn racing_uow(taken_by_other: &[&str]) -> RacingUnitOfWork {
        let mut user = User::new("u-1", "Alice");
        user.points_total = 100;
        RacingUnitOfWork {
            user,
            milestones: vec![
                Milestone::new("Ten", 10).with_badge("b-raced"),
                Milestone::new("Twenty", 20).with_badge("b-free"),
            ],
            taken_by_other: taken_by_other.iter().map(|id| id.to_string()).collect(),
            inserted: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_concurrent_duplicate_grant_treated_as_already_granted() {
        let mut uow = racing_uow(&["b-raced", "b-free"]);

        let outcome = MilestoneEvaluator::new()
            .evaluate_milestones(&mut uow, "u-1")
            .await
            .unwrap();

        assert!(outcome.unlocked.is_empty());
        assert!(outcome.notifications().is_empty());
        assert!(uow.inserted.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_grant_does_not_stop_remaining_milestones() {
        let mut uow = racing_uow(&["b-raced"]);

        let outcome = MilestoneEvaluator::new()
            .evaluate_milestones(&mut uow, "u-1")
            .await
            .unwrap();

        let titles: Vec<&str> = outcome.unlocked.iter().map(|m| m.title.as_str()).collect();
        assert_eq!(titles, vec!["Twenty"]);
        assert_eq!(uow.inserted.len(), 1);
        assert_eq!(uow.inserted[0].badge_id, "b-free");
    }

    #[tokio::test]
    async fn test_below_threshold_unlocks_nothing() {
        let store = seeded_store(49).await;
        add_milestone(&store, "Fifty", 50).await;

        assert!(evaluate(&store).await.unlocked.is_empty());
    }
}
