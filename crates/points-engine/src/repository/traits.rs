//! 仓储 Trait 定义
//!
//! 服务层只依赖这些抽象：写路径经由 `UnitOfWork` 在调用方控制的事务中执行，
//! 读路径与参考数据维护各有独立接口。

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{
    AwardRecord, Badge, LedgerReconciliation, Milestone, MonthlySummary, User, UserBadgeGrant,
};

/// 事务性工作单元
///
/// 由 `PointsStore::begin` 打开。提交与回滚由调用方决定；
/// 未提交即 drop 的工作单元视为回滚。
#[async_trait]
pub trait UnitOfWork: Send {
    /// 按 ID 读取用户
    async fn get_user(&mut self, user_id: &str) -> Result<Option<User>>;

    /// 原子累加积分总额（单条 `points_total = points_total + delta` 语句）
    ///
    /// 返回更新后的用户；用户不存在时返回 None 且不做任何修改
    async fn apply_points_delta(&mut self, user_id: &str, delta: i64) -> Result<Option<User>>;

    /// 追加积分流水
    async fn insert_award(&mut self, record: &AwardRecord) -> Result<()>;

    /// 阈值不超过给定总额的全部里程碑，按阈值升序
    async fn list_milestones_reached(&mut self, points_total: i64) -> Result<Vec<Milestone>>;

    /// 用户已持有的徽章 ID
    async fn list_granted_badge_ids(&mut self, user_id: &str) -> Result<Vec<String>>;

    /// 写入授予记录
    ///
    /// (user_id, badge_id) 已存在时返回 `PointsError::DuplicateGrant`，
    /// 且不会使当前事务失效
    async fn insert_grant(&mut self, grant: &UserBadgeGrant) -> Result<()>;

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// 事务入口
#[async_trait]
pub trait PointsStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>>;
}

/// 账本查询接口（读路径，不参与事务）
#[async_trait]
pub trait LedgerQueryRepository: Send + Sync {
    async fn find_user(&self, user_id: &str) -> Result<Option<User>>;

    /// 最近的流水，按创建时间倒序
    async fn list_awards(&self, user_id: &str, limit: i64) -> Result<Vec<AwardRecord>>;

    /// 按月汇总，按月份倒序
    async fn monthly_summaries(&self, user_id: &str) -> Result<Vec<MonthlySummary>>;

    /// 核对 points_total 与流水之和；用户不存在时返回 None
    async fn reconcile(&self, user_id: &str) -> Result<Option<LedgerReconciliation>>;

    /// 用户的徽章授予记录，按授予时间升序
    async fn list_grants(&self, user_id: &str) -> Result<Vec<UserBadgeGrant>>;
}

/// 参考数据维护接口
#[async_trait]
pub trait ReferenceDataRepository: Send + Sync {
    async fn create_badge(&self, badge: &Badge) -> Result<()>;

    async fn get_badge(&self, badge_id: &str) -> Result<Option<Badge>>;

    async fn create_milestone(&self, milestone: &Milestone) -> Result<()>;

    /// 全部里程碑，按阈值升序
    async fn list_milestones(&self) -> Result<Vec<Milestone>>;
}
