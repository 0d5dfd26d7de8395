//! 通知发送器
//!
//! 业务写入提交后调用 `dispatch`。发送是尽力而为的：
//! - 任何发布失败、超时或序列化错误都只记录日志和指标，不向调用方返回
//! - 不重试，失败的通知直接丢弃
//! - 异步模式下 `tokio::spawn` 后立即返回，不等待投递结果

use std::sync::Arc;
use std::time::Duration;

use points_shared::config::PointsConfig;
use points_shared::observability::metrics::record_notification_publish;
use tracing::{debug, warn};

use super::publisher::NotificationPublisher;
use super::types::NotificationEvent;
use crate::error::{PointsError, Result};

/// 通知发送器配置
#[derive(Debug, Clone)]
pub struct NotificationSenderConfig {
    /// 是否以 fire-and-forget 方式异步发送
    pub async_enabled: bool,
    /// 单条消息的发布超时
    pub publish_timeout: Duration,
}

impl Default for NotificationSenderConfig {
    fn default() -> Self {
        Self {
            async_enabled: true,
            publish_timeout: Duration::from_millis(500),
        }
    }
}

impl From<&PointsConfig> for NotificationSenderConfig {
    fn from(config: &PointsConfig) -> Self {
        Self {
            async_enabled: config.async_notifications,
            publish_timeout: Duration::from_millis(config.publish_timeout_ms),
        }
    }
}

/// 通知发送器
#[derive(Clone)]
pub struct NotificationSender {
    publisher: Option<Arc<dyn NotificationPublisher>>,
    config: NotificationSenderConfig,
}

impl NotificationSender {
    pub fn new(publisher: Arc<dyn NotificationPublisher>, config: NotificationSenderConfig) -> Self {
        Self {
            publisher: Some(publisher),
            config,
        }
    }

    /// 关闭通知，所有事件直接丢弃
    pub fn disabled() -> Self {
        Self {
            publisher: None,
            config: NotificationSenderConfig::default(),
        }
    }

    /// 按积分引擎配置构建，`notifications_enabled = false` 时返回关闭的发送器
    pub fn from_config(publisher: Arc<dyn NotificationPublisher>, config: &PointsConfig) -> Self {
        if config.notifications_enabled {
            Self::new(publisher, NotificationSenderConfig::from(config))
        } else {
            Self::disabled()
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.publisher.is_some()
    }

    /// 发送一组事件，按给定顺序逐条发布
    pub async fn dispatch(&self, events: Vec<NotificationEvent>) {
        if events.is_empty() {
            return;
        }

        let Some(publisher) = self.publisher.clone() else {
            debug!(count = events.len(), "通知已关闭，丢弃事件");
            return;
        };

        let timeout = self.config.publish_timeout;
        if self.config.async_enabled {
            tokio::spawn(async move {
                deliver_all(publisher.as_ref(), &events, timeout).await;
            });
        } else {
            deliver_all(publisher.as_ref(), &events, timeout).await;
        }
    }
}

/// 逐条投递，返回失败条数
async fn deliver_all(
    publisher: &dyn NotificationPublisher,
    events: &[NotificationEvent],
    timeout: Duration,
) -> usize {
    let mut failed = 0;
    for event in events {
        match deliver(publisher, event, timeout).await {
            Ok(()) => {
                record_notification_publish(event.event_type(), "success");
                debug!(
                    event_type = event.event_type(),
                    user_id = %event.user_id(),
                    "通知发布成功"
                );
            }
            Err(e) => {
                failed += 1;
                record_notification_publish(event.event_type(), "failed");
                warn!(
                    event_type = event.event_type(),
                    user_id = %event.user_id(),
                    error = %e,
                    "通知发布失败，已丢弃"
                );
            }
        }
    }
    failed
}

async fn deliver(
    publisher: &dyn NotificationPublisher,
    event: &NotificationEvent,
    timeout: Duration,
) -> Result<()> {
    let channel = event.channel();
    let payload = serde_json::to_string(event)?;

    match tokio::time::timeout(timeout, publisher.publish(&channel, &payload)).await {
        Ok(result) => result,
        Err(_) => Err(PointsError::NotificationDelivery(format!(
            "发布超时: channel={}, timeout={}ms",
            channel,
            timeout.as_millis()
        ))),
    }
}
