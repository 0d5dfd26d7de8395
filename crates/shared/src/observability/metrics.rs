//! Prometheus 指标模块
//!
//! 基于 metrics crate 和 metrics-exporter-prometheus 实现指标收集与导出。
//! 指标通过独立的 HTTP 端口暴露，供 Prometheus 抓取。

use anyhow::Result;
use axum::{Router, routing::get};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{error, info};

use super::ObservabilityConfig;

/// Metrics 资源守卫
pub struct MetricsHandle {
    _server_handle: tokio::task::JoinHandle<()>,
}

impl Drop for MetricsHandle {
    fn drop(&mut self) {
        self._server_handle.abort();
    }
}

/// 初始化 Prometheus 指标导出
///
/// 启动一个独立的 HTTP 服务器在指定端口暴露 `/metrics` 端点。
pub async fn init(config: &ObservabilityConfig) -> Result<MetricsHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    register_common_metrics(&config.service_name);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));
    let server_handle = start_metrics_server(addr, handle).await?;

    Ok(MetricsHandle {
        _server_handle: server_handle,
    })
}

/// 注册积分引擎指标的描述信息
fn register_common_metrics(service_name: &str) {
    metrics::describe_counter!("points_awards_total", "Total number of points awards");
    metrics::describe_histogram!(
        "points_award_duration_seconds",
        "Points award duration in seconds"
    );

    metrics::describe_counter!(
        "milestone_evaluations_total",
        "Total number of milestone evaluation passes"
    );
    metrics::describe_histogram!(
        "milestone_evaluation_duration_seconds",
        "Milestone evaluation duration in seconds"
    );
    metrics::describe_counter!("milestone_unlocks_total", "Total number of badges unlocked");

    metrics::describe_counter!(
        "notification_publish_total",
        "Total number of notification publish attempts"
    );

    metrics::counter!("service_starts_total", "service" => service_name.to_string()).increment(1);
}

/// 启动指标 HTTP 服务器
async fn start_metrics_server(
    addr: SocketAddr,
    handle: PrometheusHandle,
) -> Result<tokio::task::JoinHandle<()>> {
    let app = Router::new()
        .route("/metrics", get(move || std::future::ready(handle.render())))
        .route("/health", get(|| async { "OK" }));

    let listener = TcpListener::bind(addr).await?;
    info!("Metrics server listening on {}", addr);

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Metrics server error: {}", e);
        }
    });

    Ok(server_handle)
}

// ============================================================================
// 便捷的指标记录函数
// ============================================================================

/// 记录积分发放
#[inline]
pub fn record_points_award(status: &str, duration_secs: f64) {
    metrics::counter!("points_awards_total", "status" => status.to_string()).increment(1);
    metrics::histogram!("points_award_duration_seconds", "status" => status.to_string())
        .record(duration_secs);
}

/// 记录一次里程碑评估
#[inline]
pub fn record_milestone_evaluation(status: &str, unlocked: usize, duration_secs: f64) {
    metrics::counter!(
        "milestone_evaluations_total",
        "status" => status.to_string(),
        "unlocked" => (unlocked > 0).to_string()
    )
    .increment(1);
    metrics::histogram!("milestone_evaluation_duration_seconds").record(duration_secs);
}

/// 记录徽章解锁
#[inline]
pub fn record_milestone_unlock(badge_id: &str) {
    metrics::counter!("milestone_unlocks_total", "badge_id" => badge_id.to_string()).increment(1);
}

/// 记录通知发布结果
#[inline]
pub fn record_notification_publish(event_type: &str, status: &str) {
    metrics::counter!(
        "notification_publish_total",
        "event_type" => event_type.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}
