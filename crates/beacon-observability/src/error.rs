//! 日志与指标初始化过程中的错误

/// 观测性错误
#[derive(Debug, thiserror::Error)]
pub enum ObservabilityError {
    /// 配置无效，例如日志文件路径没有文件名
    #[error("invalid observability config: {0}")]
    Config(String),

    /// 过滤指令无法解析或重新加载失败
    #[error("log filter error: {0}")]
    Logging(String),

    /// recorder 安装失败
    #[error("metrics recorder error: {0}")]
    Metrics(String),

    /// 全局订阅者已经存在
    #[error("log subscriber not installed: {0}")]
    Init(String),

    /// 日志目录创建失败
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, ObservabilityError>;
