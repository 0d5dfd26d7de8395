//! PostgreSQL 仓储实现
//!
//! 写路径：`PgUnitOfWork` 包装一个 sqlx 事务，提交由调用方决定。
//! 积分总额使用单条 UPDATE 原子累加，同一用户的并发发放由行锁串行化；
//! 徽章授予依赖 `uq_user_badges_user_badge` 唯一索引去重。

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::debug;

use super::traits::{LedgerQueryRepository, PointsStore, ReferenceDataRepository, UnitOfWork};
use crate::error::{PointsError, Result};
use crate::models::{
    AwardRecord, Badge, LedgerReconciliation, Milestone, MonthlySummary, User, UserBadgeGrant,
};

/// PostgreSQL 积分存储
#[derive(Clone)]
pub struct PgPointsStore {
    pool: PgPool,
}

impl PgPointsStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// 基于 sqlx 事务的工作单元
pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl PointsStore for PgPointsStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgUnitOfWork { tx }))
    }
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn get_user(&mut self, user_id: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, floor_id, points_total, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(user)
    }

    async fn apply_points_delta(&mut self, user_id: &str, delta: i64) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET points_total = points_total + $2
            WHERE id = $1
            RETURNING id, name, floor_id, points_total, created_at
            "#,
        )
        .bind(user_id)
        .bind(delta)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(user)
    }

    async fn insert_award(&mut self, record: &AwardRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO points_log (id, user_id, delta, reason, granted_by, activity_id, created_at, month)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(&record.id)
        .bind(&record.user_id)
        .bind(record.delta)
        .bind(&record.reason)
        .bind(&record.granted_by)
        .bind(&record.activity_id)
        .bind(record.created_at)
        .bind(&record.month)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn list_milestones_reached(&mut self, points_total: i64) -> Result<Vec<Milestone>> {
        let milestones = sqlx::query_as::<_, Milestone>(
            r#"
            SELECT id, title, points_required, badge_id, created_at
            FROM milestones
            WHERE points_required <= $1
            ORDER BY points_required ASC, title ASC, id ASC
            "#,
        )
        .bind(points_total)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(milestones)
    }

    async fn list_granted_badge_ids(&mut self, user_id: &str) -> Result<Vec<String>> {
        let ids = sqlx::query_scalar::<_, String>(
            r#"
            SELECT badge_id FROM user_badges WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(ids)
    }

    async fn insert_grant(&mut self, grant: &UserBadgeGrant) -> Result<()> {
        // ON CONFLICT DO NOTHING：冲突不会让事务进入 aborted 状态，
        // 并发事务会等待先插入者提交后再判定冲突
        let inserted = sqlx::query_scalar::<_, String>(
            r#"
            INSERT INTO user_badges (id, user_id, badge_id, awarded_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, badge_id) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(&grant.id)
        .bind(&grant.user_id)
        .bind(&grant.badge_id)
        .bind(grant.awarded_at)
        .fetch_optional(&mut *self.tx)
        .await?;

        match inserted {
            Some(_) => Ok(()),
            None => {
                debug!(user_id = %grant.user_id, badge_id = %grant.badge_id, "授予记录已存在");
                Err(PointsError::DuplicateGrant {
                    user_id: grant.user_id.clone(),
                    badge_id: grant.badge_id.clone(),
                })
            }
        }
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

#[async_trait]
impl LedgerQueryRepository for PgPointsStore {
    async fn find_user(&self, user_id: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, floor_id, points_total, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn list_awards(&self, user_id: &str, limit: i64) -> Result<Vec<AwardRecord>> {
        let records = sqlx::query_as::<_, AwardRecord>(
            r#"
            SELECT id, user_id, delta, reason, granted_by, activity_id, created_at, month
            FROM points_log
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn monthly_summaries(&self, user_id: &str) -> Result<Vec<MonthlySummary>> {
        let summaries = sqlx::query_as::<_, MonthlySummary>(
            r#"
            SELECT user_id, month,
                   COALESCE(SUM(delta), 0)::BIGINT AS total_delta,
                   COUNT(*) AS award_count
            FROM points_log
            WHERE user_id = $1
            GROUP BY user_id, month
            ORDER BY month DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(summaries)
    }

    async fn reconcile(&self, user_id: &str) -> Result<Option<LedgerReconciliation>> {
        let row = sqlx::query(
            r#"
            SELECT u.id AS user_id,
                   u.points_total,
                   COALESCE(SUM(l.delta), 0)::BIGINT AS ledger_sum,
                   COUNT(l.id) AS award_count
            FROM users u
            LEFT JOIN points_log l ON l.user_id = u.id
            WHERE u.id = $1
            GROUP BY u.id, u.points_total
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| LedgerReconciliation {
            user_id: row.get("user_id"),
            points_total: row.get("points_total"),
            ledger_sum: row.get("ledger_sum"),
            award_count: row.get("award_count"),
        }))
    }

    async fn list_grants(&self, user_id: &str) -> Result<Vec<UserBadgeGrant>> {
        let grants = sqlx::query_as::<_, UserBadgeGrant>(
            r#"
            SELECT id, user_id, badge_id, awarded_at
            FROM user_badges
            WHERE user_id = $1
            ORDER BY awarded_at ASC, id ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(grants)
    }
}

#[async_trait]
impl ReferenceDataRepository for PgPointsStore {
    async fn create_badge(&self, badge: &Badge) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO badges (id, name, description, icon_url, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&badge.id)
        .bind(&badge.name)
        .bind(&badge.description)
        .bind(&badge.icon_url)
        .bind(badge.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_badge(&self, badge_id: &str) -> Result<Option<Badge>> {
        let badge = sqlx::query_as::<_, Badge>(
            r#"
            SELECT id, name, description, icon_url, created_at
            FROM badges
            WHERE id = $1
            "#,
        )
        .bind(badge_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(badge)
    }

    async fn create_milestone(&self, milestone: &Milestone) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO milestones (id, title, points_required, badge_id, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&milestone.id)
        .bind(&milestone.title)
        .bind(milestone.points_required)
        .bind(&milestone.badge_id)
        .bind(milestone.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_milestones(&self) -> Result<Vec<Milestone>> {
        let milestones = sqlx::query_as::<_, Milestone>(
            r#"
            SELECT id, title, points_required, badge_id, created_at
            FROM milestones
            ORDER BY points_required ASC, title ASC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(milestones)
    }
}
