//! 积分账本模块
//!
//! 在调用方提供的工作单元内完成一次积分发放：
//! 原子累加 `points_total` 并追加一条流水。
//!
//! ## 核心组件
//!
//! - `LedgerService` - 发放逻辑，不提交事务
//! - `AwardPointsRequest` - 发放请求
//! - `AwardOutcome` - 发放结果及其待发送的通知

mod dto;
mod service;

pub use dto::{AwardOutcome, AwardPointsRequest};
pub use service::LedgerService;
