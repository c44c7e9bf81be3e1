use crate::config::{Config, ConfigError, ConfigResult};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;

fn env_var_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("env var pattern is valid"))
}

/// 配置管理器
#[derive(Clone)]
pub struct ConfigManager {
    path: PathBuf,
    config: Arc<RwLock<Config>>,
    #[cfg(feature = "hot-reload")]
    watcher: Option<Arc<std::sync::Mutex<notify::RecommendedWatcher>>>,
}

impl ConfigManager {
    /// 加载配置文件，不存在时写入默认配置
    pub async fn load(path: &Path) -> ConfigResult<Self> {
        let config = if path.exists() {
            info!("Loading config from {:?}", path);
            let content = tokio::fs::read_to_string(path).await?;
            Self::parse(&content)?
        } else {
            info!("Config file not found, creating default config at {:?}", path);
            let default_config = Config::default();
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            let content = serde_json::to_string_pretty(&default_config)?;
            tokio::fs::write(path, &content).await?;
            default_config
        };

        Ok(Self::new(config, path.to_path_buf()))
    }

    /// 默认配置路径，见 [`crate::default_config_path`]
    pub fn default_config_path() -> ConfigResult<PathBuf> {
        crate::default_config_path()
            .ok_or_else(|| ConfigError::InvalidPath("Could not find home directory".to_string()))
    }

    /// 创建一个新的配置管理器
    pub fn new(config: Config, path: PathBuf) -> Self {
        Self {
            path,
            config: Arc::new(RwLock::new(config)),
            #[cfg(feature = "hot-reload")]
            watcher: None,
        }
    }

    /// 当前配置的快照
    pub async fn snapshot(&self) -> Config {
        self.config.read().await.clone()
    }

    /// 写回配置文件
    pub async fn save(&self) -> ConfigResult<()> {
        let content = serde_json::to_string_pretty(&*self.config.read().await)?;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, content).await?;
        info!("Config saved to {:?}", self.path);
        Ok(())
    }

    /// 重新加载配置
    pub async fn reload(&self) -> ConfigResult<()> {
        if !self.path.exists() {
            return Err(ConfigError::InvalidPath(format!(
                "Config file not found: {:?}",
                self.path
            )));
        }

        let content = tokio::fs::read_to_string(&self.path).await?;
        let new_config = Self::parse(&content)?;

        *self.config.write().await = new_config;
        info!("Config reloaded from {:?}", self.path);
        Ok(())
    }

    /// 更新配置，验证通过后写回文件
    pub async fn update<F>(&self, f: F) -> ConfigResult<()>
    where
        F: FnOnce(&mut Config) -> ConfigResult<()>,
    {
        let mut config = self.config.write().await;
        let mut updated = config.clone();
        f(&mut updated)?;
        Self::validate(&updated)?;
        *config = updated;
        drop(config);
        self.save().await
    }

    /// 验证配置
    pub fn validate(config: &Config) -> ConfigResult<()> {
        if config.client.keepalive_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "client.keepalive_interval_secs must be greater than 0".to_string(),
            ));
        }

        if config.client.reconnect_delay_secs == 0 {
            return Err(ConfigError::Validation(
                "client.reconnect_delay_secs must be greater than 0".to_string(),
            ));
        }

        if let Some(base) = &config.client.api_base_url {
            let url = Url::parse(base).map_err(|e| {
                ConfigError::Validation(format!("Invalid client.api_base_url '{}': {}", base, e))
            })?;
            if !matches!(url.scheme(), "http" | "https" | "ws" | "wss") {
                return Err(ConfigError::Validation(format!(
                    "Unsupported scheme '{}' in client.api_base_url",
                    url.scheme()
                )));
            }
        }

        if !matches!(config.identity.room.as_str(), "admin" | "standard") {
            return Err(ConfigError::Validation(format!(
                "identity.room must be 'admin' or 'standard', got '{}'",
                config.identity.room
            )));
        }

        if config.identity.locale.trim().is_empty() {
            return Err(ConfigError::Validation(
                "identity.locale cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// 解析并验证配置文件内容
    fn parse(content: &str) -> ConfigResult<Config> {
        let content = Self::expand_env_vars(content)?;
        let config: Config = serde_json::from_str(&content)?;
        Self::validate(&config)?;
        Ok(config)
    }

    /// 展开环境变量 ${VAR} 或 ${VAR:-default}
    fn expand_env_vars(content: &str) -> ConfigResult<String> {
        let mut result = content.to_string();

        for cap in env_var_pattern().captures_iter(content) {
            let full_match = &cap[0];
            let var_expr = &cap[1];

            let (var_name, default_value) = match var_expr.split_once(":-") {
                Some((name, default)) => (name, Some(default)),
                None => (var_expr, None),
            };

            let replacement = match std::env::var(var_name) {
                Ok(val) => val,
                Err(_) => match default_value {
                    Some(default) => default.to_string(),
                    None => return Err(ConfigError::EnvVarNotFound(var_name.to_string())),
                },
            };

            result = result.replace(full_match, &replacement);
        }

        Ok(result)
    }

    /// 获取配置文件路径
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(feature = "hot-reload")]
impl ConfigManager {
    /// 启动热重载监听，每次成功重载后以新配置调用 `callback`
    pub fn watch<F>(&mut self, callback: F) -> ConfigResult<()>
    where
        F: Fn(&Config) + Send + 'static,
    {
        use notify::{Config as NotifyConfig, Event, RecommendedWatcher, RecursiveMode, Result as NotifyResult, Watcher};
        use std::sync::mpsc::channel;
        use std::thread;

        let path = self.path.clone();
        let config = Arc::clone(&self.config);

        let (tx, rx) = channel();

        let mut watcher = RecommendedWatcher::new(
            move |res: NotifyResult<Event>| {
                if let Ok(event) = res {
                    if event.kind.is_modify() || event.kind.is_create() {
                        let _ = tx.send(());
                    }
                }
            },
            NotifyConfig::default(),
        )?;

        watcher.watch(&path, RecursiveMode::NonRecursive)?;
        self.watcher = Some(Arc::new(std::sync::Mutex::new(watcher)));

        // 在后台线程中监听文件变化
        thread::spawn(move || {
            while rx.recv().is_ok() {
                debug!("Config file changed, reloading...");

                let reload_result = std::fs::read_to_string(&path)
                    .map_err(ConfigError::from)
                    .and_then(|content| ConfigManager::parse(&content));

                match reload_result {
                    Ok(new_config) => {
                        *config.blocking_write() = new_config.clone();
                        info!("Config hot-reloaded successfully");
                        callback(&new_config);
                    }
                    Err(e) => {
                        warn!("Failed to hot-reload config: {}", e);
                    }
                }
            }
        });

        info!("Started watching config file: {:?}", self.path);
        Ok(())
    }

    /// 停止热重载监听
    pub fn unwatch(&mut self) -> ConfigResult<()> {
        if let Some(watcher) = self.watcher.take() {
            use notify::Watcher;
            if let Ok(mut w) = watcher.lock() {
                w.unwatch(&self.path)?;
            }
            info!("Stopped watching config file");
        }
        Ok(())
    }
}
