//! Configuration validation with range checks.

use crate::error::ConfigError;

use super::Config;

const LOG_LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace"];
const LOG_FORMATS: &[&str] = &["pretty", "json"];

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.resolver.parallel_requests == 0 {
            return Err(ConfigError::ValidationError(
                "resolver.parallel_requests must be > 0".into(),
            ));
        }
        if self.cache.max_bytes == 0 {
            return Err(ConfigError::ValidationError(
                "cache.max_bytes must be > 0".into(),
            ));
        }
        if self.cache.time_to_idle_secs == 0 {
            return Err(ConfigError::ValidationError(
                "cache.time_to_idle_secs must be > 0".into(),
            ));
        }
        if self.changes.subscriber_buffer == 0 {
            return Err(ConfigError::ValidationError(
                "changes.subscriber_buffer must be > 0".into(),
            ));
        }
        if self.enumeration.smart_album_limit == Some(0) {
            return Err(ConfigError::ValidationError(
                "enumeration.smart_album_limit must be > 0 when set".into(),
            ));
        }
        let level = self.logging.level.to_ascii_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "logging.level must be one of {}, got {:?}",
                LOG_LEVELS.join(", "),
                self.logging.level
            )));
        }
        if !LOG_FORMATS.contains(&self.logging.format.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "logging.format must be \"pretty\" or \"json\", got {:?}",
                self.logging.format
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_passes_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_parallel_requests() {
        let mut config = Config::default();
        config.resolver.parallel_requests = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("parallel_requests"));
    }

    #[test]
    fn test_validate_rejects_zero_cache_limits() {
        let mut config = Config::default();
        config.cache.max_bytes = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("cache.max_bytes"));
    }

    #[test]
    fn test_validate_rejects_zero_album_limit() {
        let mut config = Config::default();
        config.enumeration.smart_album_limit = Some(0);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("smart_album_limit"));

        config.enumeration.smart_album_limit = Some(3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_unknown_log_level() {
        let mut config = Config::default();
        config.logging.level = "verbose".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("logging.level"));

        config.logging.level = "DEBUG".into();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_unknown_log_format() {
        let mut config = Config::default();
        config.logging.format = "xml".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("logging.format"));
    }
}
