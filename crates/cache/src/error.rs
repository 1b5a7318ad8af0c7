use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors from reading or writing cached pages
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("cache metadata error: {0}")]
    Serde(#[from] serde_json::Error),

    /// A cache file exists but does not hold a valid entry
    #[error("corrupt cache entry: {}", path.display())]
    Corrupt { path: PathBuf },
}

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Invalid value for a configuration parameter
    #[error("invalid value for configuration key: {0}")]
    InvalidValue(String),

    /// I/O error reading or writing configuration file
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to write configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}
