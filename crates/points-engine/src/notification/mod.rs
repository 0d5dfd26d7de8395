//! 实时通知模块
//!
//! 积分变动和里程碑解锁后向 Redis 频道发布事件。
//!
//! ## 投递语义
//!
//! - 只在业务事务提交之后发送
//! - 尽力而为：失败只记录日志，不重试，不影响业务结果
//! - 频道：`user:{id}:notifications`、`floor:{id}:leaderboard`

pub mod publisher;
pub mod sender;
pub mod types;

pub use publisher::{NoopPublisher, NotificationPublisher, RedisPublisher};
pub use sender::{NotificationSender, NotificationSenderConfig};
pub use types::NotificationEvent;
