//! Configuration for the permission queue and the platform identifier mapping.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Default number of requests that may wait behind the one in flight
pub const DEFAULT_QUEUE_CAPACITY: usize = 32;

/// What happens to a request submitted while the queue buffer is full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Discard the incoming request; its callback never fires
    #[default]
    DropNewest,
    /// Discard the incoming request and report every identifier as denied
    DenyNewest,
}

/// What happens to a request whose owner has not reached the started state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InactiveOwnerPolicy {
    /// Skip the request; its callback never fires
    #[default]
    Drop,
    /// Skip the request and report every identifier as denied
    Deny,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Maximum number of pending requests
    pub capacity: usize,

    pub overflow: OverflowPolicy,

    pub inactive_owner: InactiveOwnerPolicy,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_QUEUE_CAPACITY,
            overflow: OverflowPolicy::default(),
            inactive_owner: InactiveOwnerPolicy::default(),
        }
    }
}

impl QueueConfig {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::InvalidCapacity);
        }
        Ok(())
    }
}

/// Concrete identifier strings the platform uses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentifierMap {
    pub images: String,
    pub video: String,
    pub audio: String,
    pub legacy_read: String,
    pub legacy_write: String,
    pub notifications: String,
}

impl Default for IdentifierMap {
    fn default() -> Self {
        Self {
            images: "android.permission.READ_MEDIA_IMAGES".to_string(),
            video: "android.permission.READ_MEDIA_VIDEO".to_string(),
            audio: "android.permission.READ_MEDIA_AUDIO".to_string(),
            legacy_read: "android.permission.READ_EXTERNAL_STORAGE".to_string(),
            legacy_write: "android.permission.WRITE_EXTERNAL_STORAGE".to_string(),
            notifications: "android.permission.POST_NOTIFICATIONS".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    /// Capability level of the running platform
    pub level: u32,

    /// Lowest level the identifier mapping knows about
    pub min_supported_level: u32,

    /// From this level on, media access is split per category
    pub fine_grained_media_level: u32,

    /// From this level on, writing shared media needs no runtime permission
    pub scoped_storage_level: u32,

    /// From this level on, posting notifications needs a runtime permission
    pub notifications_level: u32,

    pub identifiers: IdentifierMap,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            level: 34,
            min_supported_level: 1,
            fine_grained_media_level: 33,
            scoped_storage_level: 29,
            notifications_level: 33,
            identifiers: IdentifierMap::default(),
        }
    }
}

impl PlatformConfig {
    pub fn with_level(level: u32) -> Self {
        Self {
            level,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.level < self.min_supported_level {
            return Err(ConfigError::UnsupportedPlatformLevel {
                level: self.level,
                min_supported: self.min_supported_level,
            });
        }
        Ok(())
    }
}

/// Top-level configuration, usually loaded from a TOML file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PermissionConfig {
    pub queue: QueueConfig,
    pub platform: PlatformConfig,
}

impl PermissionConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        debug!("Loading permission config from {:?}", path);
        let source = fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.queue.validate()?;
        self.platform.validate()
    }
}

/// A validated platform description. Only constructible from a config that
/// passes validation, so resolution against it cannot fail.
#[derive(Debug, Clone, PartialEq)]
pub struct Platform {
    config: PlatformConfig,
}

impl Platform {
    pub fn new(config: PlatformConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn level(&self) -> u32 {
        self.config.level
    }

    pub fn identifiers(&self) -> &IdentifierMap {
        &self.config.identifiers
    }

    pub fn has_fine_grained_media(&self) -> bool {
        self.config.level >= self.config.fine_grained_media_level
    }

    pub fn has_scoped_storage(&self) -> bool {
        self.config.level >= self.config.scoped_storage_level
    }

    pub fn has_runtime_notifications(&self) -> bool {
        self.config.level >= self.config.notifications_level
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = PermissionConfig::default();
        assert_eq!(config.queue.capacity, 32);
        assert_eq!(config.queue.overflow, OverflowPolicy::DropNewest);
        assert_eq!(config.queue.inactive_owner, InactiveOwnerPolicy::Drop);
        assert_eq!(config.platform.fine_grained_media_level, 33);
        assert_eq!(config.platform.scoped_storage_level, 29);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = PermissionConfig::from_toml_str(
            r#"
            [queue]
            overflow = "deny_newest"

            [platform]
            level = 30
            "#,
        )
        .unwrap();

        assert_eq!(config.queue.capacity, DEFAULT_QUEUE_CAPACITY);
        assert_eq!(config.queue.overflow, OverflowPolicy::DenyNewest);
        assert_eq!(config.platform.level, 30);
        assert_eq!(
            config.platform.identifiers.legacy_read,
            "android.permission.READ_EXTERNAL_STORAGE"
        );
    }

    #[test]
    fn test_zero_capacity_is_rejected() {
        let err = PermissionConfig::from_toml_str("[queue]\ncapacity = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidCapacity));
    }

    #[test]
    fn test_unsupported_level_is_fatal() {
        let err = Platform::new(PlatformConfig {
            level: 15,
            min_supported_level: 21,
            ..PlatformConfig::default()
        })
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::UnsupportedPlatformLevel {
                level: 15,
                min_supported: 21
            }
        ));
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        let err = PermissionConfig::from_toml_str("[queue\ncapacity = ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[queue]\ncapacity = 4\ninactive_owner = \"deny\"").unwrap();

        let config = PermissionConfig::from_file(file.path()).unwrap();
        assert_eq!(config.queue.capacity, 4);
        assert_eq!(config.queue.inactive_owner, InactiveOwnerPolicy::Deny);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = PermissionConfig::from_file(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_config_serialization_round_trip() {
        let config = PermissionConfig::default();
        let serialized = toml::to_string(&config).unwrap();
        let deserialized = PermissionConfig::from_toml_str(&serialized).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_platform_thresholds() {
        let modern = Platform::new(PlatformConfig::with_level(33)).unwrap();
        assert!(modern.has_fine_grained_media());
        assert!(modern.has_scoped_storage());
        assert!(modern.has_runtime_notifications());

        let legacy = Platform::new(PlatformConfig::with_level(28)).unwrap();
        assert!(!legacy.has_fine_grained_media());
        assert!(!legacy.has_scoped_storage());
        assert!(!legacy.has_runtime_notifications());
    }
}
