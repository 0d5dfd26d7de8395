//! 积分发放逻辑
//!
//! 执行顺序：
//! 1. 原子累加 `points_total`（单条语句，用户不存在时不做任何修改）
//! 2. 追加流水，记录累加前请求中的 delta 与元数据
//!
//! 事务的提交与回滚由调用方负责。

use tracing::{debug, instrument};

use super::dto::{AwardOutcome, AwardPointsRequest};
use crate::error::{PointsError, Result};
use crate::repository::UnitOfWork;

/// 积分账本服务
#[derive(Debug, Clone, Copy, Default)]
pub struct LedgerService;

impl LedgerService {
    pub fn new() -> Self {
        Self
    }

    /// 在给定工作单元内发放积分
    ///
    /// 用户不存在时返回 `UserNotFound`，此时工作单元内没有任何写入
    #[instrument(skip(self, uow), fields(user_id = %request.user_id, delta = request.delta))]
    pub async fn award_points(
        &self,
        uow: &mut dyn UnitOfWork,
        request: AwardPointsRequest,
    ) -> Result<AwardOutcome> {
        let user = uow
            .apply_points_delta(&request.user_id, request.delta)
            .await?
            .ok_or_else(|| PointsError::UserNotFound(request.user_id.clone()))?;

        let record = request.into_record();
        uow.insert_award(&record).await?;

        debug!(
            award_id = %record.id,
            new_total = user.points_total,
            "积分流水已写入"
        );

        Ok(AwardOutcome {
            record,
            new_total: user.points_total,
            floor_id: user.floor_id,
        })
    }
}
