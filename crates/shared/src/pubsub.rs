//! Redis 发布通道模块
//!
//! 只负责 PUBLISH，订阅与消费由下游实时推送服务处理。

use crate::config::RedisConfig;
use crate::error::{Result, SharedError};
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};
use tracing::{debug, info, instrument};

/// Redis 发布客户端
#[derive(Clone)]
pub struct PubSub {
    client: Client,
}

impl PubSub {
    /// 创建 Redis 客户端（不会立即建立连接）
    pub fn new(config: &RedisConfig) -> Result<Self> {
        let client = Client::open(config.url.as_str())?;
        info!("Redis pub/sub client created");
        Ok(Self { client })
    }

    /// 获取连接
    async fn get_conn(&self) -> Result<MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(SharedError::from)
    }

    /// 健康检查
    pub async fn health_check(&self) -> Result<()> {
        let mut conn = self.get_conn().await?;
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map(|_| ())
            .map_err(SharedError::from)
    }

    /// 发布原始消息
    ///
    /// 返回 Redis 报告的接收方数量，0 表示当前无订阅者
    #[instrument(skip(self, payload))]
    pub async fn publish(&self, channel: &str, payload: &str) -> Result<u64> {
        let mut conn = self.get_conn().await?;
        let receivers: u64 = conn.publish(channel, payload).await?;
        debug!(channel = %channel, receivers = receivers, "消息已发布");
        Ok(receivers)
    }
}

/// 通知频道名生成器
pub struct Channel;

impl Channel {
    /// 用户个人通知频道
    pub fn user_notifications(user_id: &str) -> String {
        format!("user:{}:notifications", user_id)
    }

    /// 楼层排行榜频道
    pub fn floor_leaderboard(floor_id: &str) -> String {
        format!("floor:{}:leaderboard", floor_id)
    }
}
