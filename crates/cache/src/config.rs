//! Cache configuration: sizes and location of the page caches.
//!
//! Configuration can be loaded from a TOML file, from environment variables,
//! or created programmatically.

use crate::disk::DiskTileCache;
use crate::error::{CacheError, ConfigError};
use crate::layered::LayeredCache;
use crate::ram::RamTileCache;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const MB: usize = 1024 * 1024;

/// Configuration for the page caches.
///
/// Serialized with sizes in megabytes:
///
/// ```toml
/// ram_cache_mb = 256
/// disk_cache_mb = 1024
/// disk_cache_dir = "/path/to/cache"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "CacheConfigFile", into = "CacheConfigFile")]
pub struct CacheConfig {
    /// RAM cache size limit in bytes
    pub ram_cache_size: usize,
    /// Disk cache size limit in bytes
    pub disk_cache_size: usize,
    /// Root directory for disk cache storage
    pub disk_cache_dir: PathBuf,
}

/// On-disk shape of [`CacheConfig`]; missing keys take defaults
#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheConfigFile {
    #[serde(skip_serializing_if = "Option::is_none")]
    ram_cache_mb: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    disk_cache_mb: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    disk_cache_dir: Option<PathBuf>,
}

impl From<CacheConfigFile> for CacheConfig {
    fn from(file: CacheConfigFile) -> Self {
        let mut config = CacheConfig::default();
        if let Some(mb) = file.ram_cache_mb {
            config.ram_cache_size = mb * MB;
        }
        if let Some(mb) = file.disk_cache_mb {
            config.disk_cache_size = mb * MB;
        }
        if let Some(dir) = file.disk_cache_dir {
            config.disk_cache_dir = dir;
        }
        config
    }
}

impl From<CacheConfig> for CacheConfigFile {
    fn from(config: CacheConfig) -> Self {
        Self {
            ram_cache_mb: Some(config.ram_cache_mb()),
            disk_cache_mb: Some(config.disk_cache_mb()),
            disk_cache_dir: Some(config.disk_cache_dir),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ram_cache_size: 256 * MB,   // 256 MB
            disk_cache_size: 1024 * MB, // 1 GB
            disk_cache_dir: Self::default_cache_dir(),
        }
    }
}

impl CacheConfig {
    /// Creates a new cache configuration with sizes in megabytes.
    pub fn new(ram_mb: usize, disk_mb: usize, disk_dir: PathBuf) -> Self {
        Self {
            ram_cache_size: ram_mb * MB,
            disk_cache_size: disk_mb * MB,
            disk_cache_dir: disk_dir,
        }
    }

    /// Sets the RAM cache size in megabytes.
    pub fn with_ram_mb(mut self, mb: usize) -> Self {
        self.ram_cache_size = mb * MB;
        self
    }

    /// Sets the disk cache size in megabytes.
    pub fn with_disk_mb(mut self, mb: usize) -> Self {
        self.disk_cache_size = mb * MB;
        self
    }

    /// Sets the disk cache directory.
    pub fn with_disk_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.disk_cache_dir = path.as_ref().to_path_buf();
        self
    }

    /// Returns the default cache directory for the current platform.
    ///
    /// - macOS: ~/Library/Caches/pageflow/tiles
    /// - Linux: ~/.cache/pageflow/tiles
    /// - Windows: %LOCALAPPDATA%\pageflow\tiles
    pub fn default_cache_dir() -> PathBuf {
        if let Some(cache_dir) = dirs::cache_dir() {
            cache_dir.join("pageflow").join("tiles")
        } else {
            PathBuf::from("cache/tiles")
        }
    }

    /// Loads configuration from environment variables.
    ///
    /// - `PAGEFLOW_RAM_CACHE_MB`: RAM cache size in MB (default: 256)
    /// - `PAGEFLOW_DISK_CACHE_MB`: Disk cache size in MB (default: 1024)
    /// - `PAGEFLOW_CACHE_DIR`: Disk cache directory path
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_overrides()
    }

    /// Apply `PAGEFLOW_*` environment overrides on top of this configuration.
    pub fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        if let Some(mb) = env_mb("PAGEFLOW_RAM_CACHE_MB")? {
            self.ram_cache_size = mb * MB;
        }
        if let Some(mb) = env_mb("PAGEFLOW_DISK_CACHE_MB")? {
            self.disk_cache_size = mb * MB;
        }
        if let Ok(dir) = std::env::var("PAGEFLOW_CACHE_DIR") {
            self.disk_cache_dir = PathBuf::from(dir);
        }
        Ok(self)
    }

    /// Loads configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path.as_ref())?;
        Self::from_toml(&contents)
    }

    /// Parses configuration from a TOML string. Unknown keys are ignored.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Saves configuration to a TOML file.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        fs::write(path.as_ref(), self.to_toml()?)?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string(self)?)
    }

    pub fn ram_cache_mb(&self) -> usize {
        self.ram_cache_size / MB
    }

    pub fn disk_cache_mb(&self) -> usize {
        self.disk_cache_size / MB
    }

    /// Cache directory for one document.
    ///
    /// `document_key` is usually the document path or URI; it is hashed so
    /// any string maps to a stable, filesystem-safe directory name.
    pub fn document_dir(&self, document_key: &str) -> PathBuf {
        let digest = md5::compute(document_key.as_bytes());
        self.disk_cache_dir.join(format!("{digest:x}"))
    }

    /// Build the RAM and disk caches for one document.
    pub fn open_document_cache(&self, document_key: &str) -> Result<LayeredCache, CacheError> {
        let ram = RamTileCache::new(self.ram_cache_size);
        let disk = DiskTileCache::new(self.document_dir(document_key), self.disk_cache_size)?;
        Ok(LayeredCache::new(ram, disk))
    }
}

fn env_mb(name: &str) -> Result<Option<usize>, ConfigError> {
    match std::env::var(name) {
        Ok(val) => val
            .trim()
            .parse::<usize>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue(name.to_string())),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use tempfile::TempDir;

    const ENV_VARS: [&str; 3] = [
        "PAGEFLOW_RAM_CACHE_MB",
        "PAGEFLOW_DISK_CACHE_MB",
        "PAGEFLOW_CACHE_DIR",
    ];

    // Helper to save and restore environment variables
    struct EnvGuard {
        vars: Vec<(String, Option<String>)>,
    }

    impl EnvGuard {
        fn new(var_names: &[&str]) -> Self {
            let vars = var_names
                .iter()
                .map(|name| (name.to_string(), env::var(name).ok()))
                .collect();
            Self { vars }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (name, value) in &self.vars {
                match value {
                    Some(v) => env::set_var(name, v),
                    None => env::remove_var(name),
                }
            }
        }
    }

    #[test]
    fn test_default_config() {
        let config = CacheConfig::default();
        assert_eq!(config.ram_cache_size, 256 * MB);
        assert_eq!(config.disk_cache_size, 1024 * MB);
        assert!(config.disk_cache_dir.ends_with("tiles"));
    }

    #[test]
    fn test_builder_methods() {
        let config = CacheConfig::default()
            .with_ram_mb(512)
            .with_disk_mb(2048)
            .with_disk_dir("/custom/path");

        assert_eq!(config.ram_cache_mb(), 512);
        assert_eq!(config.disk_cache_mb(), 2048);
        assert_eq!(config.disk_cache_dir, PathBuf::from("/custom/path"));
    }

    #[test]
    #[serial]
    fn test_from_env() {
        let _guard = EnvGuard::new(&ENV_VARS);

        env::set_var("PAGEFLOW_RAM_CACHE_MB", "128");
        env::set_var("PAGEFLOW_DISK_CACHE_MB", "512");
        env::set_var("PAGEFLOW_CACHE_DIR", "/tmp/test-cache");

        let config = CacheConfig::from_env().unwrap();
        assert_eq!(config, CacheConfig::new(128, 512, PathBuf::from("/tmp/test-cache")));
    }

    #[test]
    #[serial]
    fn test_from_env_partial() {
        let _guard = EnvGuard::new(&ENV_VARS);

        env::remove_var("PAGEFLOW_DISK_CACHE_MB");
        env::remove_var("PAGEFLOW_CACHE_DIR");
        env::set_var("PAGEFLOW_RAM_CACHE_MB", "128");

        let config = CacheConfig::from_env().unwrap();
        assert_eq!(config.ram_cache_mb(), 128);
        assert_eq!(config.disk_cache_mb(), 1024); // default
    }

    #[test]
    #[serial]
    fn test_from_env_invalid() {
        let _guard = EnvGuard::new(&ENV_VARS);

        env::set_var("PAGEFLOW_RAM_CACHE_MB", "not_a_number");
        let result = CacheConfig::from_env();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue(key)) if key == "PAGEFLOW_RAM_CACHE_MB"
        ));
    }

    #[test]
    fn test_from_toml() {
        let toml = r#"
            # Test configuration
            ram_cache_mb = 128
            disk_cache_mb = 512
            disk_cache_dir = "/tmp/test"
        "#;

        let config = CacheConfig::from_toml(toml).unwrap();
        assert_eq!(config, CacheConfig::new(128, 512, PathBuf::from("/tmp/test")));
    }

    #[test]
    fn test_from_toml_partial() {
        let config = CacheConfig::from_toml("ram_cache_mb = 128").unwrap();
        assert_eq!(config.ram_cache_mb(), 128);
        assert_eq!(config.disk_cache_mb(), 1024); // default
    }

    #[test]
    fn test_from_toml_invalid() {
        let result = CacheConfig::from_toml("ram_cache_mb = \"lots\"");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_file_save_and_load() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("cache.toml");

        let config = CacheConfig::new(128, 512, PathBuf::from("/tmp/cache"));
        config.save_to_file(&config_path).unwrap();

        let loaded = CacheConfig::from_file(&config_path).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn test_document_dir_is_stable_per_key() {
        let config = CacheConfig::default().with_disk_dir("/cache");

        let a = config.document_dir("/docs/manual.pdf");
        assert_eq!(a, config.document_dir("/docs/manual.pdf"));
        assert_ne!(a, config.document_dir("/docs/other.pdf"));
        assert_eq!(a.parent(), Some(Path::new("/cache")));

        // MD5 digest of the key
        assert_eq!(a, Path::new("/cache/8790d3a7eebd3f3c5900d933930eabe0"));
    }

    #[test]
    fn test_open_document_cache() {
        let dir = TempDir::new().unwrap();
        let config = CacheConfig::new(16, 16, dir.path().to_path_buf());

        let cache = config.open_document_cache("book.pdf").unwrap();
        assert!(config.document_dir("book.pdf").is_dir());
        assert_eq!(cache.ram().stats().memory_limit, 16 * MB);
        assert_eq!(cache.disk().disk_limit(), 16 * MB);
    }
}
