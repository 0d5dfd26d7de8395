//! 积分服务
//!
//! 写路径的统一入口。每个操作都遵循同一顺序：
//!
//! 1. 打开工作单元
//! 2. 执行账本发放和/或里程碑评估
//! 3. 提交（失败则回滚，错误原样返回）
//! 4. 提交成功后发送通知（尽力而为，不影响返回值）

use std::sync::Arc;
use std::time::Instant;

use tracing::{info, instrument, warn};

use points_shared::observability::metrics::{record_milestone_evaluation, record_points_award};

use crate::error::Result;
use crate::ledger::{AwardOutcome, AwardPointsRequest, LedgerService};
use crate::milestone::{EvaluationOutcome, MilestoneEvaluator};
use crate::models::{AwardRecord, Milestone};
use crate::notification::NotificationSender;
use crate::repository::{PointsStore, UnitOfWork};
use crate::service::dto::AwardSummary;

/// 积分服务
#[derive(Clone)]
pub struct PointsService {
    store: Arc<dyn PointsStore>,
    ledger: LedgerService,
    evaluator: MilestoneEvaluator,
    sender: NotificationSender,
}

fn status_label<T>(result: &Result<T>) -> &'static str {
    match result {
        Ok(_) => "success",
        Err(e) => e.error_code(),
    }
}

async fn rollback_quietly(uow: Box<dyn UnitOfWork>) {
    if let Err(e) = uow.rollback().await {
        warn!(error = %e, "事务回滚失败");
    }
}

impl PointsService {
    pub fn new(store: Arc<dyn PointsStore>, sender: NotificationSender) -> Self {
        Self {
            store,
            ledger: LedgerService::new(),
            evaluator: MilestoneEvaluator::new(),
            sender,
        }
    }

    /// 发放积分（不评估里程碑）
    #[instrument(skip(self), fields(user_id = %request.user_id, delta = request.delta))]
    pub async fn award_points(&self, request: AwardPointsRequest) -> Result<AwardRecord> {
        let started = Instant::now();
        let result = self.award_in_transaction(request).await;
        record_points_award(status_label(&result), started.elapsed().as_secs_f64());

        let outcome = result?;
        info!(
            award_id = %outcome.record.id,
            new_total = outcome.new_total,
            "积分发放成功"
        );

        self.sender.dispatch(outcome.notifications()).await;
        Ok(outcome.record)
    }

    /// 评估里程碑，返回本次新解锁的里程碑
    #[instrument(skip(self))]
    pub async fn evaluate_milestones(&self, user_id: &str) -> Result<Vec<Milestone>> {
        let started = Instant::now();
        let result = self.evaluate_in_transaction(user_id).await;
        let unlocked = result.as_ref().map(|o| o.unlocked.len()).unwrap_or(0);
        record_milestone_evaluation(
            status_label(&result),
            unlocked,
            started.elapsed().as_secs_f64(),
        );

        let outcome = result?;
        self.sender.dispatch(outcome.notifications()).await;
        Ok(outcome.unlocked)
    }

    /// 在同一事务中发放积分并评估里程碑，提交一次
    ///
    /// 通知顺序：积分变动、排行榜变动、各里程碑解锁
    #[instrument(skip(self), fields(user_id = %request.user_id, delta = request.delta))]
    pub async fn award_and_evaluate(&self, request: AwardPointsRequest) -> Result<AwardSummary> {
        let started = Instant::now();
        let result = self.award_and_evaluate_in_transaction(request).await;
        record_points_award(status_label(&result), started.elapsed().as_secs_f64());

        let (award, evaluation) = result?;
        info!(
            award_id = %award.record.id,
            new_total = award.new_total,
            unlocked_count = evaluation.unlocked.len(),
            "积分发放及里程碑评估完成"
        );

        let mut events = award.notifications();
        events.extend(evaluation.notifications());
        self.sender.dispatch(events).await;

        Ok(AwardSummary {
            record: award.record,
            new_total: award.new_total,
            unlocked: evaluation.unlocked,
        })
    }

    // ==================== 私有方法 ====================

    async fn award_in_transaction(&self, request: AwardPointsRequest) -> Result<AwardOutcome> {
        let mut uow = self.store.begin().await?;
        match self.ledger.award_points(uow.as_mut(), request).await {
            Ok(outcome) => {
                uow.commit().await?;
                Ok(outcome)
            }
            Err(e) => {
                rollback_quietly(uow).await;
                Err(e)
            }
        }
    }

    async fn evaluate_in_transaction(&self, user_id: &str) -> Result<EvaluationOutcome> {
        let mut uow = self.store.begin().await?;
        match self.evaluator.evaluate_milestones(uow.as_mut(), user_id).await {
            Ok(outcome) => {
                uow.commit().await?;
                Ok(outcome)
            }
            Err(e) => {
                rollback_quietly(uow).await;
                Err(e)
            }
        }
    }

    async fn award_and_evaluate_in_transaction(
        &self,
        request: AwardPointsRequest,
    ) -> Result<(AwardOutcome, EvaluationOutcome)> {
        let user_id = request.user_id.clone();
        let mut uow = self.store.begin().await?;

        let award = match self.ledger.award_points(uow.as_mut(), request).await {
            Ok(award) => award,
            Err(e) => {
                rollback_quietly(uow).await;
                return Err(e);
            }
        };

        // 评估指标覆盖评估步骤及其提交结果
        let evaluation_started = Instant::now();
        let evaluation = match self.evaluator.evaluate_milestones(uow.as_mut(), &user_id).await {
            Ok(evaluation) => evaluation,
            Err(e) => {
                record_milestone_evaluation(
                    e.error_code(),
                    0,
                    evaluation_started.elapsed().as_secs_f64(),
                );
                rollback_quietly(uow).await;
                return Err(e);
            }
        };

        let committed = uow.commit().await;
        record_milestone_evaluation(
            status_label(&committed),
            evaluation.unlocked.len(),
            evaluation_started.elapsed().as_secs_f64(),
        );
        committed?;
        Ok((award, evaluation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::error::PointsError;
    use crate::models::{AwardRecord, Badge, User, UserBadgeGrant};
    use crate::notification::NotificationSenderConfig;
    use crate::notification::publisher::MockNotificationPublisher;
    use crate::repository::{LedgerQueryRepository, MemoryPointsStore, ReferenceDataRepository};

    fn sync_sender(publisher: MockNotificationPublisher) -> NotificationSender {
        NotificationSender::new(
            Arc::new(publisher),
            NotificationSenderConfig {
                async_enabled: false,
                publish_timeout: Duration::from_millis(100),
            },
        )
    }

    async fn store_with_milestone(threshold: i64) -> (MemoryPointsStore, Milestone) {
        let store = MemoryPointsStore::new();
        store
            .insert_user(User::new("u-1", "Alice").with_floor("f-1"))
            .await;
        let badge = Badge::new("First Fifty");
        store.create_badge(&badge).await.unwrap();
        let milestone = Milestone::new("First Fifty", threshold).with_badge(badge.id.clone());
        store.create_milestone(&milestone).await.unwrap();
        (store, milestone)
    }

    #[tokio::test]
    async fn test_award_points_commits_then_notifies() {
        let (store, _) = store_with_milestone(50).await;
        let mut publisher = MockNotificationPublisher::new();
        // points.awarded + leaderboard.update
        publisher.expect_publish().times(2).returning(|_, _| Ok(()));

        let service = PointsService::new(Arc::new(store.clone()), sync_sender(publisher));
        let record = service
            .award_points(AwardPointsRequest::new("u-1", 60))
            .await
            .unwrap();

        assert_eq!(record.delta, 60);
        // 单独发放不会解锁里程碑
        assert_eq!(store.grant_count().await, 0);
        assert_eq!(store.find_user("u-1").await.unwrap().unwrap().points_total, 60);
    }

    #[tokio::test]
    async fn test_award_unknown_user_sends_nothing() {
        let store = MemoryPointsStore::new();
        let mut publisher = MockNotificationPublisher::new();
        publisher.expect_publish().never();

        let service = PointsService::new(Arc::new(store.clone()), sync_sender(publisher));
        let err = service
            .award_points(AwardPointsRequest::new("ghost", 5))
            .await
            .unwrap_err();

        assert!(matches!(err, PointsError::UserNotFound(_)));
        assert_eq!(store.award_count().await, 0);
    }

    #[tokio::test]
    async fn test_award_and_evaluate_unlocks_in_one_commit() {
        let (store, milestone) = store_with_milestone(50).await;
        let mut publisher = MockNotificationPublisher::new();
        publisher.expect_publish().times(3).returning(|_, _| Ok(()));

        let service = PointsService::new(Arc::new(store.clone()), sync_sender(publisher));
        let summary = service
            .award_and_evaluate(AwardPointsRequest::new("u-1", 50))
            .await
            .unwrap();

        assert_eq!(summary.new_total, 50);
        assert_eq!(summary.unlocked, vec![milestone]);
        assert_eq!(store.grant_count().await, 1);
    }

    #[tokio::test]
    async fn test_notification_failure_does_not_fail_award() {
        let (store, _) = store_with_milestone(10).await;
        let mut publisher = MockNotificationPublisher::new();
        publisher
            .expect_publish()
            .returning(|_, _| Err(PointsError::NotificationDelivery("down".into())));

        let service = PointsService::new(Arc::new(store.clone()), sync_sender(publisher));
        let summary = service
            .award_and_evaluate(AwardPointsRequest::new("u-1", 10))
            .await
            .unwrap();

        assert_eq!(summary.unlocked.len(), 1);
        assert_eq!(store.award_count().await, 1);
    }

    /// 记录每次注册的计数器名称与 status 标签
    #[derive(Default)]
    struct CapturingRecorder {
        counters: std::sync::Mutex<Vec<(String, String)>>,
    }

    impl CapturingRecorder {
        fn statuses(&self, name: &str) -> Vec<String> {
            self.counters
                .lock()
                .unwrap()
                .iter()
                .filter(|(n, _)| n == name)
                .map(|(_, status)| status.clone())
                .collect()
        }
    }

    impl metrics::Recorder for CapturingRecorder {
        fn describe_counter(&self, _: metrics::KeyName, _: Option<metrics::Unit>, _: metrics::SharedString) {}
        fn describe_gauge(&self, _: metrics::KeyName, _: Option<metrics::Unit>, _: metrics::SharedString) {}
        fn describe_histogram(&self, _: metrics::KeyName, _: Option<metrics::Unit>, _: metrics::SharedString) {}

        fn register_counter(&self, key: &metrics::Key, _: &metrics::Metadata<'_>) -> metrics::Counter {
            let status = key
                .labels()
                .find(|label| label.key() == "status")
                .map(|label| label.value().to_string())
                .unwrap_or_default();
            self.counters
                .lock()
                .unwrap()
                .push((key.name().to_string(), status));
            metrics::Counter::noop()
        }

        fn register_gauge(&self, _: &metrics::Key, _: &metrics::Metadata<'_>) -> metrics::Gauge {
            metrics::Gauge::noop()
        }

        fn register_histogram(&self, _: &metrics::Key, _: &metrics::Metadata<'_>) -> metrics::Histogram {
            metrics::Histogram::noop()
        }
    }

    /// 里程碑查询失败的存储，其余操作委托给内存实现
    struct MilestoneOutageStore {
        inner: MemoryPointsStore,
    }

    struct MilestoneOutageUnitOfWork {
        inner: Box<dyn UnitOfWork>,
    }

    #[async_trait::async_trait]
    impl PointsStore for MilestoneOutageStore {
        async fn begin(&self) -> Result<Box<dyn UnitOfWork>> {
            Ok(Box::new(MilestoneOutageUnitOfWork {
                inner: self.inner.begin().await?,
            }))
        }
    }

    #[async_trait::async_trait]
    impl UnitOfWork for MilestoneOutageUnitOfWork {
        async fn get_user(&mut self, user_id: &str) -> Result<Option<User>> {
            self.inner.get_user(user_id).await
        }

        async fn apply_points_delta(&mut self, user_id: &str, delta: i64) -> Result<Option<User>> {
            self.inner.apply_points_delta(user_id, delta).await
        }

        async fn insert_award(&mut self, record: &AwardRecord) -> Result<()> {
            self.inner.insert_award(record).await
        }

        async fn list_milestones_reached(&mut self, _points_total: i64) -> Result<Vec<Milestone>> {
            Err(PointsError::Internal("milestones 表不可用".to_string()))
        }

        async fn list_granted_badge_ids(&mut self, user_id: &str) -> Result<Vec<String>> {
            self.inner.list_granted_badge_ids(user_id).await
        }

        async fn insert_grant(&mut self, grant: &UserBadgeGrant) -> Result<()> {
            self.inner.insert_grant(grant).await
        }

        async fn commit(self: Box<Self>) -> Result<()> {
            self.inner.commit().await
        }

        async fn rollback(self: Box<Self>) -> Result<()> {
            self.inner.rollback().await
        }
    }

    #[test]
    fn test_evaluation_failure_recorded_and_award_rolled_back() {
        let recorder = CapturingRecorder::default();
        let store = MemoryPointsStore::new();

        let err = metrics::with_local_recorder(&recorder, || {
            tokio_test::block_on(async {
                store.insert_user(User::new("u-1", "Alice")).await;
                let service = PointsService::new(
                    Arc::new(MilestoneOutageStore {
                        inner: store.clone(),
                    }),
                    NotificationSender::disabled(),
                );
                service
                    .award_and_evaluate(AwardPointsRequest::new("u-1", 10))
                    .await
                    .unwrap_err()
            })
        });

        assert_eq!(err.error_code(), "INTERNAL_ERROR");
        assert_eq!(
            recorder.statuses("milestone_evaluations_total"),
            vec!["INTERNAL_ERROR"]
        );
        assert_eq!(recorder.statuses("points_awards_total"), vec!["INTERNAL_ERROR"]);
        assert_eq!(tokio_test::block_on(store.award_count()), 0);
    }

    #[test]
    fn test_award_and_evaluate_records_evaluation_success() {
        let recorder = CapturingRecorder::default();

        metrics::with_local_recorder(&recorder, || {
            tokio_test::block_on(async {
                let (store, _) = store_with_milestone(50).await;
                let service = PointsService::new(Arc::new(store), NotificationSender::disabled());
                service
                    .award_and_evaluate(AwardPointsRequest::new("u-1", 50))
                    .await
                    .unwrap();
            })
        });

        assert_eq!(recorder.statuses("milestone_evaluations_total"), vec!["success"]);
        assert_eq!(recorder.statuses("milestone_unlocks_total").len(), 1);
    }

    #[tokio::test]
    async fn test_evaluate_milestones_separately() {
        let (store, milestone) = store_with_milestone(50).await;
        let service = PointsService::new(Arc::new(store.clone()), NotificationSender::disabled());

        service
            .award_points(AwardPointsRequest::new("u-1", 50))
            .await
            .unwrap();
        let unlocked = service.evaluate_milestones("u-1").await.unwrap();
        assert_eq!(unlocked, vec![milestone]);

        assert!(service.evaluate_milestones("u-1").await.unwrap().is_empty());
    }
}
