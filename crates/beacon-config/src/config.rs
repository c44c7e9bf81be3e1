use serde::{Deserialize, Serialize};

/// 主配置结构体
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub version: String,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            client: ClientConfig::default(),
            identity: IdentityConfig::default(),
            notifications: NotificationsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

fn parse_bool(value: &str) -> ConfigResult<bool> {
    value
        .parse()
        .map_err(|_| ConfigError::Validation(format!("Invalid boolean: {}", value)))
}

fn parse_secs(value: &str) -> ConfigResult<u64> {
    value
        .parse()
        .map_err(|_| ConfigError::Validation(format!("Invalid number: {}", value)))
}

/// 空字符串视为未设置
fn optional(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

impl Config {
    /// 获取配置值的快捷方法
    pub fn get_value(&self, key: &str) -> Option<String> {
        let parts: Vec<&str> = key.split('.').collect();
        match parts.as_slice() {
            ["version"] => Some(self.version.clone()),
            ["client", "api_base_url"] => self.client.api_base_url.clone(),
            ["client", "ws_path"] => Some(self.client.ws_path.clone()),
            ["client", "keepalive_interval_secs"] => {
                Some(self.client.keepalive_interval_secs.to_string())
            }
            ["client", "reconnect_delay_secs"] => {
                Some(self.client.reconnect_delay_secs.to_string())
            }
            ["identity", "user_id"] => self.identity.user_id.clone(),
            ["identity", "room"] => Some(self.identity.room.clone()),
            ["identity", "locale"] => Some(self.identity.locale.clone()),
            ["notifications", "enabled"] => Some(self.notifications.enabled.to_string()),
            ["notifications", "event_types"] => {
                self.notifications.event_types.as_ref().map(|types| types.join(","))
            }
            ["logging", "level"] => Some(self.logging.level.to_string()),
            ["logging", "file"] => self.logging.file.clone(),
            ["logging", "json"] => Some(self.logging.json.to_string()),
            _ => None,
        }
    }

    /// 设置配置值
    pub fn set_value(&mut self, key: &str, value: &str) -> ConfigResult<()> {
        let parts: Vec<&str> = key.split('.').collect();
        match parts.as_slice() {
            ["client", "api_base_url"] => {
                self.client.api_base_url = optional(value);
            }
            ["client", "ws_path"] => {
                self.client.ws_path = value.to_string();
            }
            ["client", "keepalive_interval_secs"] => {
                self.client.keepalive_interval_secs = parse_secs(value)?;
            }
            ["client", "reconnect_delay_secs"] => {
                self.client.reconnect_delay_secs = parse_secs(value)?;
            }
            ["identity", "user_id"] => {
                self.identity.user_id = optional(value);
            }
            ["identity", "room"] => {
                self.identity.room = value.trim().to_lowercase();
            }
            ["identity", "locale"] => {
                self.identity.locale = value.trim().to_string();
            }
            ["notifications", "enabled"] => {
                self.notifications.enabled = parse_bool(value)?;
            }
            ["notifications", "event_types"] => {
                let types: Vec<String> = value
                    .split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(String::from)
                    .collect();
                self.notifications.event_types = if types.is_empty() { None } else { Some(types) };
            }
            ["logging", "level"] => {
                self.logging.level = value.parse()?;
            }
            ["logging", "file"] => {
                self.logging.file = optional(value);
            }
            ["logging", "json"] => {
                self.logging.json = parse_bool(value)?;
            }
            _ => return Err(ConfigError::KeyNotFound(key.to_string())),
        }
        Ok(())
    }
}

/// 连接配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    /// HTTP API 地址，WebSocket 地址由此推导
    pub api_base_url: Option<String>,
    /// WebSocket 路径
    pub ws_path: String,
    /// 心跳间隔（秒）
    pub keepalive_interval_secs: u64,
    /// 断线重连延迟（秒）
    pub reconnect_delay_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: None,
            ws_path: "/ws".to_string(),
            keepalive_interval_secs: 25,
            reconnect_delay_secs: 3,
        }
    }
}

/// 身份配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IdentityConfig {
    pub user_id: Option<String>,
    /// admin 或 standard
    pub room: String,
    pub locale: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            user_id: None,
            room: "admin".to_string(),
            locale: "en".to_string(),
        }
    }
}

/// 通知配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NotificationsConfig {
    pub enabled: bool,
    /// 触发通知的事件类型，未设置时使用内置列表
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_types: Option<Vec<String>>,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            event_types: None,
        }
    }
}

/// 日志级别
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> ConfigResult<Self> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(ConfigError::Validation(format!("Invalid log level: {}", s))),
        }
    }
}

/// Logging 配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    /// 日志文件路径，按天滚动
    pub file: Option<String>,
    /// 输出 JSON 格式
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            file: None,
            json: false,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Watch error: {0}")]
    #[cfg(feature = "hot-reload")]
    Watch(#[from] notify::Error),
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
