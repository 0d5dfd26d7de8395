//! 数据访问层
//!
//! 提供积分账本、里程碑和徽章授予的数据访问接口。
//!
//! ## 设计原则
//!
//! - 仓储只负责数据持久化，不包含业务逻辑
//! - 写路径通过 `UnitOfWork` 执行，事务的提交/回滚由调用方决定
//! - PostgreSQL 实现使用 SQLx；内存实现用于测试与本地试运行

mod memory_store;
mod pg_store;
mod traits;

pub use memory_store::{MemoryPointsStore, MemoryUnitOfWork};
pub use pg_store::{PgPointsStore, PgUnitOfWork};
pub use traits::*;
