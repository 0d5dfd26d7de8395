//! 命令执行器
//!
//! 负责组装存储、服务与通知通道，并以 JSON 输出命令结果。

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use points_shared::config::AppConfig;
use points_shared::database::Database;
use points_shared::pubsub::PubSub;

use super::commands::{BadgeCommand, Commands, MilestoneCommand};
use crate::ledger::AwardPointsRequest;
use crate::notification::{
    NoopPublisher, NotificationPublisher, NotificationSender, NotificationSenderConfig,
    RedisPublisher,
};
use crate::repository::PgPointsStore;
use crate::service::dto::{CreateBadgeRequest, CreateMilestoneRequest};
use crate::service::{CatalogService, LedgerQueryService, PointsService};

/// 命令执行器
pub struct CommandRunner {
    db: Database,
    points: PointsService,
    queries: LedgerQueryService,
    catalog: CatalogService,
}

impl CommandRunner {
    /// 连接数据库与 Redis 并构建服务
    pub async fn connect(config: &AppConfig, notify: bool) -> Result<Self> {
        let db = Database::connect(&config.database)
            .await
            .context("连接数据库失败")?;
        info!("Database connection established");

        let sender = if notify && config.points.notifications_enabled {
            // 进程在命令结束后立即退出，通知必须同步发送完毕
            let sender_config = NotificationSenderConfig {
                async_enabled: false,
                ..NotificationSenderConfig::from(&config.points)
            };
            NotificationSender::new(build_publisher(config).await, sender_config)
        } else {
            NotificationSender::disabled()
        };

        let store = Arc::new(PgPointsStore::new(db.pool().clone()));
        Ok(Self {
            points: PointsService::new(store.clone(), sender),
            queries: LedgerQueryService::new(store.clone()),
            catalog: CatalogService::new(store),
            db,
        })
    }

    /// 执行子命令
    pub async fn run(&self, command: Commands) -> Result<()> {
        match command {
            Commands::Migrate => {
                self.db.run_migrations().await.context("数据库迁移失败")?;
                info!("Migrations applied");
                print_json(&serde_json::json!({ "migrated": true }))
            }
            Commands::Badge {
                command:
                    BadgeCommand::Create {
                        name,
                        description,
                        icon_url,
                    },
            } => {
                let badge = self
                    .catalog
                    .create_badge(CreateBadgeRequest {
                        name,
                        description,
                        icon_url,
                    })
                    .await?;
                print_json(&badge)
            }
            Commands::Milestone { command } => match command {
                MilestoneCommand::Create {
                    title,
                    points_required,
                    badge_id,
                } => {
                    let milestone = self
                        .catalog
                        .create_milestone(CreateMilestoneRequest {
                            title,
                            points_required,
                            badge_id,
                        })
                        .await?;
                    print_json(&milestone)
                }
                MilestoneCommand::List => print_json(&self.catalog.list_milestones().await?),
            },
            Commands::Award {
                user,
                delta,
                granted_by,
                reason,
                activity,
            } => {
                let request = AwardPointsRequest {
                    user_id: user,
                    delta,
                    granted_by,
                    reason,
                    activity_id: activity,
                };
                print_json(&self.points.award_and_evaluate(request).await?)
            }
            Commands::Evaluate { user } => {
                print_json(&self.points.evaluate_milestones(&user).await?)
            }
            Commands::History { user, limit } => {
                print_json(&self.queries.history(&user, limit).await?)
            }
            Commands::Summary { user } => {
                print_json(&self.queries.monthly_summaries(&user).await?)
            }
            Commands::Reconcile { user } => print_json(&self.queries.reconcile(&user).await?),
        }
    }

    pub async fn shutdown(self) {
        self.db.close().await;
    }
}

/// Redis 不可用时退化为空发布通道，积分写入不受影响
async fn build_publisher(config: &AppConfig) -> Arc<dyn NotificationPublisher> {
    let pubsub = match PubSub::new(&config.redis) {
        Ok(pubsub) => pubsub,
        Err(e) => {
            warn!(error = %e, "Redis 配置无效，通知已关闭");
            return Arc::new(NoopPublisher);
        }
    };

    match pubsub.health_check().await {
        Ok(()) => {
            info!("Redis connection established");
            Arc::new(RedisPublisher::new(pubsub))
        }
        Err(e) => {
            warn!(error = %e, "Redis 健康检查失败，通知已关闭");
            Arc::new(NoopPublisher)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let output = serde_json::to_string_pretty(value).context("序列化输出失败")?;
    println!("{output}");
    Ok(())
}
