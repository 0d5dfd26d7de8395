//! 徽章与里程碑维护服务
//!
//! 由管理端在评估开始前预置参考数据。

use std::sync::Arc;

use tracing::{info, instrument};

use crate::error::{PointsError, Result};
use crate::models::{Badge, Milestone};
use crate::repository::ReferenceDataRepository;
use crate::service::dto::{CreateBadgeRequest, CreateMilestoneRequest};

/// 参考数据服务
#[derive(Clone)]
pub struct CatalogService {
    repo: Arc<dyn ReferenceDataRepository>,
}

impl CatalogService {
    pub fn new(repo: Arc<dyn ReferenceDataRepository>) -> Self {
        Self { repo }
    }

    #[instrument(skip(self), fields(name = %request.name))]
    pub async fn create_badge(&self, request: CreateBadgeRequest) -> Result<Badge> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(PointsError::Validation("徽章名称不能为空".to_string()));
        }

        let badge = Badge::new(name)
            .with_description(request.description)
            .with_icon_url(request.icon_url);
        self.repo.create_badge(&badge).await?;

        info!(badge_id = %badge.id, "徽章已创建");
        Ok(badge)
    }

    /// 创建里程碑
    ///
    /// 阈值不能为负；关联的徽章必须已存在
    #[instrument(skip(self), fields(title = %request.title, points_required = request.points_required))]
    pub async fn create_milestone(&self, request: CreateMilestoneRequest) -> Result<Milestone> {
        let title = request.title.trim();
        if title.is_empty() {
            return Err(PointsError::Validation("里程碑标题不能为空".to_string()));
        }
        if request.points_required < 0 {
            return Err(PointsError::Validation(format!(
                "里程碑阈值不能为负数: {}",
                request.points_required
            )));
        }

        let mut milestone = Milestone::new(title, request.points_required);
        if let Some(badge_id) = request.badge_id {
            if self.repo.get_badge(&badge_id).await?.is_none() {
                return Err(PointsError::BadgeNotFound(badge_id));
            }
            milestone = milestone.with_badge(badge_id);
        }
        self.repo.create_milestone(&milestone).await?;

        info!(milestone_id = %milestone.id, "里程碑已创建");
        Ok(milestone)
    }

    pub async fn list_milestones(&self) -> Result<Vec<Milestone>> {
        self.repo.list_milestones().await
    }
}
