pub mod config;
pub mod manager;

pub use config::{
    ClientConfig, Config, ConfigError, ConfigResult, IdentityConfig, LogLevel, LoggingConfig,
    NotificationsConfig,
};
pub use manager::ConfigManager;

use std::path::{Path, PathBuf};

/// 覆盖 Beacon 目录的环境变量
pub const HOME_ENV: &str = "BEACON_HOME";

/// Beacon 目录：`$BEACON_HOME`，否则 `~/.beacon`
pub fn beacon_dir() -> Option<PathBuf> {
    match std::env::var_os(HOME_ENV) {
        Some(dir) if !dir.is_empty() => Some(PathBuf::from(dir)),
        _ => dirs::home_dir().map(|home| home.join(".beacon")),
    }
}

/// 默认配置文件 `<beacon_dir>/config.json`
pub fn default_config_path() -> Option<PathBuf> {
    beacon_dir().map(|dir| dir.join("config.json"))
}

/// 确保 Beacon 目录存在
pub async fn ensure_beacon_dir() -> ConfigResult<()> {
    if let Some(dir) = beacon_dir() {
        tokio::fs::create_dir_all(&dir).await?;
    }
    Ok(())
}

/// 展开开头的 `~/`
pub fn expand_tilde(path: &str) -> Option<PathBuf> {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir().map(|home| home.join(rest)),
        None => Some(PathBuf::from(path)),
    }
}

/// 解析 `logging.file`：相对路径放在 `<beacon_dir>/logs` 下
pub fn resolve_log_path(file: &str) -> Option<PathBuf> {
    let path = expand_tilde(file)?;
    if path.is_absolute() {
        return Some(path);
    }
    beacon_dir().map(|dir| dir.join("logs").join(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    // 只有这个测试修改 BEACON_HOME
    #[test]
    fn test_beacon_dir_and_log_paths() {
        std::env::remove_var(HOME_ENV);
        let dir = beacon_dir().unwrap();
        assert!(dir.ends_with(".beacon"));
        assert_eq!(default_config_path(), Some(dir.join("config.json")));

        std::env::set_var(HOME_ENV, "/srv/beacon");
        assert_eq!(beacon_dir(), Some(PathBuf::from("/srv/beacon")));
        assert_eq!(
            resolve_log_path("listen.log"),
            Some(PathBuf::from("/srv/beacon/logs/listen.log"))
        );
        assert_eq!(
            resolve_log_path("/var/log/beacon.log"),
            Some(PathBuf::from("/var/log/beacon.log"))
        );
        std::env::remove_var(HOME_ENV);
    }

    #[test]
    fn test_expand_tilde() {
        let expanded = expand_tilde("~/logs/listen.log").unwrap();
        assert!(!expanded.to_string_lossy().starts_with('~'));
        assert!(Path::new(&expanded).ends_with("logs/listen.log"));

        assert_eq!(expand_tilde("relative.log"), Some(PathBuf::from("relative.log")));
    }
}
