//! 指标收集模块
//!
//! 安装 Prometheus recorder，并登记同步客户端发出的指标描述。

use metrics::{describe_counter, describe_gauge, Unit};
#[cfg(feature = "prometheus")]
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::config::Config;
#[cfg(feature = "prometheus")]
use crate::error::ObservabilityError;
use crate::error::Result;

/// 同步客户端发出的指标名称
pub mod names {
    /// 连接尝试次数
    pub const CONNECT_ATTEMPTS: &str = "beacon_sync_connect_attempts_total";
    /// 成功建立的连接
    pub const CONNECTIONS_OPENED: &str = "beacon_sync_connections_opened_total";
    /// 关闭的连接（reason = intentional | lost）
    pub const CONNECTIONS_CLOSED: &str = "beacon_sync_connections_closed_total";
    /// 计划中的重连
    pub const RECONNECTS_SCHEDULED: &str = "beacon_sync_reconnects_scheduled_total";
    /// 当前是否在线
    pub const CONNECTED: &str = "beacon_sync_connected";
    /// 收到的帧（outcome = delivered | internal | malformed）
    pub const FRAMES: &str = "beacon_sync_frames_total";
    /// 订阅回调 panic 次数
    pub const CALLBACK_PANICS: &str = "beacon_sync_callback_panics_total";
    /// 发出的通知
    pub const NOTIFICATIONS: &str = "beacon_sync_notifications_total";
}

/// 指标收集器
pub struct MetricsCollector {
    #[cfg(feature = "prometheus")]
    handle: Option<PrometheusHandle>,
}

impl std::fmt::Debug for MetricsCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsCollector")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

impl MetricsCollector {
    /// 按配置安装全局 Prometheus recorder；关闭时不安装任何 recorder
    pub async fn new(config: &Config) -> Result<Self> {
        if !config.metrics {
            return Ok(Self::disabled());
        }

        #[cfg(feature = "prometheus")]
        {
            let recorder = PrometheusBuilder::new().build_recorder();
            let handle = recorder.handle();
            metrics::set_global_recorder(recorder)
                .map_err(|e| ObservabilityError::Metrics(e.to_string()))?;
            register_descriptions();

            tracing::info!(target: "beacon_observability", "Prometheus recorder installed");
            Ok(Self {
                handle: Some(handle),
            })
        }

        #[cfg(not(feature = "prometheus"))]
        {
            tracing::warn!(
                target: "beacon_observability",
                "Built without the prometheus feature, metrics are dropped"
            );
            Ok(Self::disabled())
        }
    }

    fn disabled() -> Self {
        Self {
            #[cfg(feature = "prometheus")]
            handle: None,
        }
    }

    /// 是否安装了 recorder
    pub fn is_enabled(&self) -> bool {
        #[cfg(feature = "prometheus")]
        {
            self.handle.is_some()
        }
        #[cfg(not(feature = "prometheus"))]
        {
            false
        }
    }

    /// Prometheus 文本格式的快照，未安装时为空
    pub fn render(&self) -> String {
        #[cfg(feature = "prometheus")]
        {
            self.handle
                .as_ref()
                .map(PrometheusHandle::render)
                .unwrap_or_default()
        }
        #[cfg(not(feature = "prometheus"))]
        {
            String::new()
        }
    }
}

/// 注册指标描述
fn register_descriptions() {
    describe_counter!(
        names::CONNECT_ATTEMPTS,
        Unit::Count,
        "Connection attempts started"
    );
    describe_counter!(
        names::CONNECTIONS_OPENED,
        Unit::Count,
        "Connections that reached the open state"
    );
    describe_counter!(
        names::CONNECTIONS_CLOSED,
        Unit::Count,
        "Connections closed, by reason"
    );
    describe_counter!(
        names::RECONNECTS_SCHEDULED,
        Unit::Count,
        "Reconnects scheduled after an unexpected close"
    );
    describe_gauge!(
        names::CONNECTED,
        Unit::Count,
        "1 while the transport is open"
    );
    describe_counter!(
        names::FRAMES,
        Unit::Count,
        "Inbound frames, by outcome"
    );
    describe_counter!(
        names::CALLBACK_PANICS,
        Unit::Count,
        "Subscriber callbacks that panicked"
    );
    describe_counter!(
        names::NOTIFICATIONS,
        Unit::Count,
        "Notifications raised for notable events"
    );
}
