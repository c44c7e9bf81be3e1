//! 观测性配置
//!
//! 事件监听客户端需要的全部开关：过滤指令、输出格式、日志文件、
//! 同步引擎的单独级别，以及是否导出指标。

#[cfg(feature = "beacon-config")]
pub mod beacon_integration;

use std::io::IsTerminal;
use std::path::PathBuf;

/// 同步引擎的 tracing target
pub const SYNC_TARGET: &str = "beacon_sync";

/// 日志输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// 人类可读的文本
    #[default]
    Text,
    /// 每行一个 JSON 对象
    Json,
}

/// 观测性配置
#[derive(Debug, Clone)]
pub struct Config {
    /// 全局过滤指令（`EnvFilter` 语法），默认取 `RUST_LOG`，否则为 `info`
    pub filter: String,
    /// 同步引擎的级别，覆盖全局指令
    pub sync_level: Option<String>,
    /// stderr 与日志文件共用的格式
    pub format: LogFormat,
    /// 按天滚动的日志文件
    pub log_file: Option<PathBuf>,
    /// stderr 是否带颜色
    pub ansi: bool,
    /// 是否安装 Prometheus recorder
    pub metrics: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            filter: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            sync_level: None,
            format: LogFormat::Text,
            log_file: None,
            ansi: std::io::stderr().is_terminal(),
            metrics: true,
        }
    }
}

impl Config {
    /// 替换全局过滤指令
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    /// 单独调整同步引擎的级别
    pub fn with_sync_level(mut self, level: impl Into<String>) -> Self {
        self.sync_level = Some(level.into());
        self
    }

    /// 输出格式
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// 日志文件
    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = Some(path.into());
        self
    }

    /// 指标开关
    pub fn with_metrics(mut self, enabled: bool) -> Self {
        self.metrics = enabled;
        self
    }

    /// 完整的过滤指令：全局指令加上同步引擎的级别
    pub fn directives(&self) -> String {
        match &self.sync_level {
            Some(level) => format!("{},{}={}", self.filter, SYNC_TARGET, level),
            None => self.filter.clone(),
        }
    }
}
