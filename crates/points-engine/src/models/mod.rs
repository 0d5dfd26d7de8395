//! 积分引擎领域模型
//!
//! 包含用户、积分流水、徽章、里程碑与授予记录

pub mod award;
pub mod badge;
pub mod user;

// 重新导出常用类型
pub use award::{AwardRecord, LedgerReconciliation, MonthlySummary, month_bucket};
pub use badge::{Badge, Milestone, UserBadgeGrant};
pub use user::User;
