//! Configuration management for Photoshelf.
//!
//! Configuration is loaded from the platform config directory with sensible
//! defaults. All config structs implement `Default`.

mod types;
mod validate;

pub use types::*;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure for Photoshelf.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Album enumeration settings
    pub enumeration: EnumerationConfig,

    /// Image resolution settings
    pub resolver: ResolverConfig,

    /// Decoded image cache settings
    pub cache: CacheConfig,

    /// Change notification settings
    pub changes: ChangesConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns default configuration if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path.
    ///
    /// Uses platform-appropriate directories:
    /// - macOS: ~/Library/Application Support/com.photoshelf.photoshelf/config.toml
    /// - Linux: ~/.config/photoshelf/config.toml
    /// - Windows: C:\Users\<User>\AppData\Roaming\photoshelf\config\config.toml
    ///
    /// Falls back to ~/.photoshelf/config.toml if directory detection fails.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "photoshelf", "photoshelf")
            .map(|dirs| dirs.config_dir().to_path_buf().join("config.toml"))
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".photoshelf").join("config.toml")
            })
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::DeliveryMode;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.enumeration.skip_known_count_albums);
        assert!(config.resolver.allow_network_access);
        assert_eq!(config.resolver.delivery_mode, DeliveryMode::Opportunistic);
        assert_eq!(config.cache.max_bytes, 256 * 1024 * 1024);
        assert_eq!(config.changes.subscriber_buffer, 64);
    }

    #[test]
    fn test_config_to_toml() {
        let config = Config::default();
        let toml = config.to_toml().unwrap();
        assert!(toml.contains("[enumeration]"));
        assert!(toml.contains("[resolver]"));
        assert!(toml.contains("delivery_mode = \"opportunistic\""));
    }

    #[test]
    fn test_load_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[resolver]\nallow_network_access = false\ndelivery_mode = \"high_quality\"\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert!(!config.resolver.allow_network_access);
        assert_eq!(config.resolver.delivery_mode, DeliveryMode::HighQuality);
        assert_eq!(config.resolver.parallel_requests, 4);
        assert!(config.enumeration.skip_known_count_albums);
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[changes]\nsubscriber_buffer = 0\n").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("subscriber_buffer"));
    }
}
