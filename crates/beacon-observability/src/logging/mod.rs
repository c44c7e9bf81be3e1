//! 结构化日志
//!
//! stderr 总是输出；配置了日志文件时再加一个按天滚动的文件输出。
//! 过滤器放在 reload 层里，运行中可以换级别。

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Registry,
};

use crate::config::{Config, LogFormat};
use crate::error::{ObservabilityError, Result};

type FilterHandle = reload::Handle<EnvFilter, Registry>;

/// 日志管理器
pub struct LogManager {
    /// 当前生效的过滤指令
    directives: String,
    filter: FilterHandle,
    /// 文件写入线程的守卫，释放时刷新缓冲
    file_guard: Option<WorkerGuard>,
}

impl std::fmt::Debug for LogManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogManager")
            .field("directives", &self.directives)
            .field("file_output", &self.file_guard.is_some())
            .finish()
    }
}

impl LogManager {
    /// 安装全局订阅者。一个进程只能成功一次。
    pub async fn new(config: &Config) -> Result<Self> {
        let directives = config.directives();
        let (filter, handle) = reload::Layer::new(parse_filter(&directives)?);

        let (file_writer, file_guard) = match &config.log_file {
            Some(path) => {
                let (writer, guard) = tracing_appender::non_blocking(file_appender(path)?);
                (Some(writer), Some(guard))
            }
            None => (None, None),
        };

        let registry = tracing_subscriber::registry().with(filter);
        let installed = match config.format {
            LogFormat::Json => registry
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .with(file_writer.map(|w| fmt::layer().json().with_writer(w)))
                .try_init(),
            LogFormat::Text => registry
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_ansi(config.ansi),
                )
                .with(file_writer.map(|w| fmt::layer().with_writer(w).with_ansi(false)))
                .try_init(),
        };
        installed.map_err(|e| ObservabilityError::Init(e.to_string()))?;

        tracing::info!(
            target: "beacon_observability",
            filter = %directives,
            file = ?config.log_file,
            "Logging initialized"
        );

        Ok(Self {
            directives,
            filter: handle,
            file_guard,
        })
    }

    /// 换成新的过滤指令；指令无效时保持原样
    pub fn update_level(&mut self, directives: &str) -> Result<()> {
        let next = parse_filter(directives)?;
        self.filter
            .reload(next)
            .map_err(|e| ObservabilityError::Logging(e.to_string()))?;
        self.directives = directives.to_string();

        tracing::info!(target: "beacon_observability", "Log filter now '{}'", directives);
        Ok(())
    }

    /// 当前生效的过滤指令
    pub fn directives(&self) -> &str {
        &self.directives
    }

    /// 刷新并关闭文件输出
    pub fn shutdown(&mut self) {
        if self.file_guard.take().is_some() {
            tracing::debug!(target: "beacon_observability", "Log file flushed");
        }
    }
}

fn parse_filter(directives: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(directives)
        .map_err(|e| ObservabilityError::Logging(format!("'{}': {}", directives, e)))
}

/// 按天滚动的日志文件，`path` 的文件名作为前缀
fn file_appender(path: &Path) -> Result<tracing_appender::rolling::RollingFileAppender> {
    let prefix = path
        .file_name()
        .ok_or_else(|| ObservabilityError::Config(format!("log file {:?} has no file name", path)))?;
    let directory = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    std::fs::create_dir_all(directory)?;
    Ok(tracing_appender::rolling::daily(directory, prefix))
}

/// 标记一次监听会话的 span
pub fn create_session_span(user_id: &str, room: &str) -> tracing::Span {
    tracing::info_span!("session", user_id = %user_id, room = %room)
}
