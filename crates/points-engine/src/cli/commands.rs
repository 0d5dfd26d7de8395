//! CLI 命令定义

use clap::{Parser, Subcommand};

use crate::service::query_service::DEFAULT_HISTORY_LIMIT;

/// 积分引擎命令行工具
#[derive(Parser, Debug)]
#[command(name = "points-cli")]
#[command(version, about = "积分账本与里程碑运维工具")]
#[command(propagate_version = true)]
pub struct Cli {
    /// 关闭实时通知
    #[arg(long)]
    pub no_notify: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// 子命令
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// 执行数据库迁移
    Migrate,

    /// 徽章维护
    Badge {
        #[command(subcommand)]
        command: BadgeCommand,
    },

    /// 里程碑维护
    Milestone {
        #[command(subcommand)]
        command: MilestoneCommand,
    },

    /// 发放积分（负数为扣分），并在同一事务中评估里程碑
    Award {
        /// 用户 ID
        #[arg(short, long)]
        user: String,

        /// 积分变动值
        #[arg(short, long, allow_negative_numbers = true)]
        delta: i64,

        /// 发放人
        #[arg(long)]
        granted_by: Option<String>,

        /// 发放原因
        #[arg(long)]
        reason: Option<String>,

        /// 关联活动 ID
        #[arg(long)]
        activity: Option<String>,
    },

    /// 按当前积分总额评估里程碑
    Evaluate {
        #[arg(short, long)]
        user: String,
    },

    /// 查询最近的积分流水
    History {
        #[arg(short, long)]
        user: String,

        #[arg(short, long, default_value_t = DEFAULT_HISTORY_LIMIT)]
        limit: i64,
    },

    /// 按月汇总积分
    Summary {
        #[arg(short, long)]
        user: String,
    },

    /// 核对积分总额与流水之和
    Reconcile {
        #[arg(short, long)]
        user: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum BadgeCommand {
    /// 创建徽章
    Create {
        #[arg(long)]
        name: String,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        icon_url: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum MilestoneCommand {
    /// 创建里程碑
    Create {
        #[arg(long)]
        title: String,

        #[arg(long)]
        points_required: i64,

        /// 解锁时授予的徽章
        #[arg(long)]
        badge_id: Option<String>,
    },

    /// 列出全部里程碑
    List,
}
