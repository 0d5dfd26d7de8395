//! 服务层
//!
//! 对外暴露的积分引擎入口，负责事务边界与提交后的通知发送。
//!
//! ## 模块结构
//!
//! - `dto`: 数据传输对象定义
//! - `points_service`: 积分发放与里程碑评估（写路径）
//! - `query_service`: 账本查询（只读）
//! - `catalog_service`: 徽章与里程碑维护

pub mod catalog_service;
pub mod dto;
pub mod points_service;
pub mod query_service;

pub use catalog_service::CatalogService;
pub use dto::*;
pub use points_service::PointsService;
pub use query_service::LedgerQueryService;
