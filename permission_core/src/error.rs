use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PermissionError>;

/// Configuration problems. All of them are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unsupported platform level {level} (minimum supported is {min_supported})")]
    UnsupportedPlatformLevel { level: u32, min_supported: u32 },

    #[error("Queue capacity must be at least 1")]
    InvalidCapacity,

    #[error("Unknown capability category: {0}")]
    UnknownCategory(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("TOML error: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Error)]
pub enum PermissionError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Coordinator runtime error: {0}")]
    Runtime(#[from] io::Error),

    #[error("Permission facade has not been installed")]
    NotInstalled,

    #[error("Permission facade is already installed")]
    AlreadyInstalled,
}
