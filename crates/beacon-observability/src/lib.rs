//! Beacon 的日志与指标
//!
//! `Observability::init` 安装 tracing 订阅者和 Prometheus recorder，
//! 同步引擎发出的 `tracing` 事件和 `metrics` 计数都经由这里输出。

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;

pub use config::{Config, LogFormat};
pub use error::{ObservabilityError, Result};
pub use logging::{create_session_span, LogManager};
pub use metrics::MetricsCollector;

use parking_lot::RwLock;
use std::sync::Arc;

/// 进程级的观测性句柄
#[derive(Debug)]
pub struct Observability {
    log_manager: Arc<RwLock<LogManager>>,
    metrics: Arc<MetricsCollector>,
}

impl Observability {
    /// 安装日志与指标。每个进程调用一次。
    pub async fn init(config: Config) -> Result<Self> {
        let log_manager = Arc::new(RwLock::new(LogManager::new(&config).await?));
        let metrics = Arc::new(MetricsCollector::new(&config).await?);

        Ok(Self {
            log_manager,
            metrics,
        })
    }

    /// 日志管理器
    pub fn log_manager(&self) -> Arc<RwLock<LogManager>> {
        Arc::clone(&self.log_manager)
    }

    /// 指标收集器
    pub fn metrics(&self) -> Arc<MetricsCollector> {
        Arc::clone(&self.metrics)
    }

    /// 运行中更换过滤指令
    pub fn update_log_level(&self, directives: &str) -> Result<()> {
        self.log_manager.write().update_level(directives)
    }

    /// Prometheus 文本格式的指标快照
    pub fn render_metrics(&self) -> String {
        self.metrics.render()
    }

    /// 刷新日志文件
    pub fn shutdown(self) {
        tracing::info!(target: "beacon_observability", "Shutting down observability");
        self.log_manager.write().shutdown();
    }
}
