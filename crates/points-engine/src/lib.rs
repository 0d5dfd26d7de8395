//! 积分引擎
//!
//! 为用户发放积分、维护只追加的积分流水，并在积分总额达到阈值时自动解锁里程碑徽章。
//!
//! ## 核心功能
//!
//! - **积分发放**：原子累加用户积分总额，同时追加一条不可变流水
//! - **里程碑解锁**：按阈值升序评估，每个徽章对每个用户最多授予一次
//! - **实时通知**：事务提交后向 Redis 频道推送积分、排行榜和解锁事件
//! - **账本查询**：历史流水、按月汇总与总额核对
//!
//! ## 模块结构
//!
//! - `models`: 领域模型定义
//! - `error`: 错误类型定义
//! - `repository`: 工作单元与存储实现（PostgreSQL / 内存）
//! - `ledger`: 积分发放
//! - `milestone`: 里程碑评估
//! - `notification`: 通知发送
//! - `service`: 服务层入口
//! - `cli`: 命令行工具

pub mod cli;
pub mod error;
pub mod ledger;
pub mod milestone;
pub mod models;
pub mod notification;
pub mod repository;
pub mod service;

pub use error::{PointsError, Result};
pub use ledger::{AwardOutcome, AwardPointsRequest, LedgerService};
pub use milestone::{EvaluationOutcome, MilestoneEvaluator};
pub use models::*;
pub use notification::{
    NoopPublisher, NotificationEvent, NotificationPublisher, NotificationSender,
    NotificationSenderConfig, RedisPublisher,
};
pub use repository::{
    LedgerQueryRepository, MemoryPointsStore, PgPointsStore, PointsStore, ReferenceDataRepository,
    UnitOfWork,
};
pub use service::{CatalogService, LedgerQueryService, PointsService, dto};
