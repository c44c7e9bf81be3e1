//! 从 beacon-config 的 `logging` 段构建观测性配置

use crate::config::{Config, LogFormat};

impl From<&beacon_config::Config> for Config {
    fn from(config: &beacon_config::Config) -> Self {
        let logging = &config.logging;
        let mut converted = Config::default()
            .with_filter(logging.level.as_str())
            .with_format(if logging.json {
                LogFormat::Json
            } else {
                LogFormat::Text
            });

        if let Some(path) = logging.file.as_deref().and_then(beacon_config::resolve_log_path) {
            converted = converted.with_log_file(path);
        }

        converted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_config::LogLevel;

    #[test]
    fn test_logging_section_maps_to_outputs() {
        let mut config = beacon_config::Config::default();
        config.logging.level = LogLevel::Debug;
        config.logging.json = true;
        config.logging.file = Some("/var/log/beacon/listen.log".to_string());

        let converted = Config::from(&config);

        assert_eq!(converted.directives(), "debug");
        assert_eq!(converted.format, LogFormat::Json);
        assert_eq!(
            converted.log_file.as_deref(),
            Some(std::path::Path::new("/var/log/beacon/listen.log"))
        );
    }

    #[test]
    fn test_defaults_log_to_stderr_only() {
        let converted = Config::from(&beacon_config::Config::default());
        assert_eq!(converted.filter, "info");
        assert_eq!(converted.format, LogFormat::Text);
        assert!(converted.log_file.is_none());
        assert!(converted.metrics);
    }
}
