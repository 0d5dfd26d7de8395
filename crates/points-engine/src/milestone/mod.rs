//! 里程碑评估模块
//!
//! 用户积分总额达到里程碑阈值后，自动授予里程碑关联的徽章。
//!
//! - `MilestoneEvaluator` - 在调用方的工作单元内评估并写入授予记录
//! - `EvaluationOutcome` - 本次新解锁的里程碑

mod evaluator;

pub use evaluator::{EvaluationOutcome, MilestoneEvaluator};
