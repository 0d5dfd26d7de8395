//! 通知发布通道
//!
//! 只负责把已序列化的消息投递到指定频道，失败以 `NotificationDelivery` 返回。

use async_trait::async_trait;
use points_shared::pubsub::PubSub;

use crate::error::{PointsError, Result};

/// 发布通道接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationPublisher: Send + Sync {
    async fn publish(&self, channel: &str, payload: &str) -> Result<()>;
}

/// 基于 Redis PUBLISH 的发布通道
#[derive(Clone)]
pub struct RedisPublisher {
    pubsub: PubSub,
}

impl RedisPublisher {
    pub fn new(pubsub: PubSub) -> Self {
        Self { pubsub }
    }
}

#[async_trait]
impl NotificationPublisher for RedisPublisher {
    async fn publish(&self, channel: &str, payload: &str) -> Result<()> {
        self.pubsub
            .publish(channel, payload)
            .await
            .map(|_| ())
            .map_err(|e| PointsError::NotificationDelivery(e.to_string()))
    }
}

/// 空发布通道（未配置 Redis 时使用）
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPublisher;

#[async_trait]
impl NotificationPublisher for NoopPublisher {
    async fn publish(&self, _channel: &str, _payload: &str) -> Result<()> {
        Ok(())
    }
}
