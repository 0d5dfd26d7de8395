//! CLI 模块
//!
//! 运维入口，直接操作 PostgreSQL 中的积分账本：
//!
//! - `migrate` - 执行数据库迁移
//! - `badge create` / `milestone create` - 预置参考数据
//! - `award` - 发放积分并评估里程碑
//! - `evaluate` - 单独评估里程碑
//! - `history` / `summary` / `reconcile` - 账本查询
//!
//! # 使用示例
//!
//! ```bash
//! points-cli migrate
//! points-cli badge create --name "Centurion"
//! points-cli milestone create --title "Hundred" --points-required 100 --badge-id <id>
//! points-cli award --user u-1 --delta 50 --reason "lightning talk"
//! points-cli reconcile --user u-1
//! ```

pub mod commands;
pub mod runner;

pub use commands::{BadgeCommand, Cli, Commands, MilestoneCommand};
pub use runner::CommandRunner;
