//! Reader configuration
//!
//! One serde record covering layout, gesture tuning, render scheduling and
//! the optional page cache. Loadable from TOML with `PAGEFLOW_*` environment
//! overrides on top.

use pageflow_cache::{CacheConfig, ConfigError};
use pageflow_scheduler::WorkerPoolConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use viewer_core::{Orientation, ViewerConfig, DEFAULT_MAX_ZOOM, DEFAULT_MIN_ZOOM};

/// Configuration for a [`Reader`](crate::Reader).
///
/// ```toml
/// spacing = 12.0
/// orientation = "horizontal"
/// max_zoom = 20.0
/// full_page_debounce_ms = 300
///
/// [cache]
/// ram_cache_mb = 128
/// disk_cache_mb = 512
/// ```
///
/// Missing keys take their defaults. Without a `[cache]` table the reader
/// renders every page without caching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Gap between pages in layout units
    pub spacing: f32,
    pub orientation: Orientation,
    pub min_zoom: f32,
    pub max_zoom: f32,

    /// Prefetch margin as a fraction of the viewport extent
    pub prefetch_margin: f32,

    /// Quiet period before a changed full-page size is rendered
    pub full_page_debounce_ms: u64,

    /// Quiet period before a changed visible fragment is rendered
    pub fragment_debounce_ms: u64,

    /// Fling decay constant, per second
    pub friction: f32,
    pub fling_stop_velocity: f32,
    pub velocity_window_ms: u64,
    pub double_tap_ladder: Vec<f32>,
    pub spring_stiffness: f32,

    /// Render worker threads
    pub worker_threads: usize,
    pub worker_poll_interval_ms: u64,

    /// Page shown first when nothing else was restored
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_page: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheConfig>,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        let viewer = ViewerConfig::default();
        Self {
            spacing: viewer.spacing,
            orientation: viewer.orientation,
            min_zoom: DEFAULT_MIN_ZOOM,
            max_zoom: DEFAULT_MAX_ZOOM,
            prefetch_margin: viewer.prefetch_margin,
            full_page_debounce_ms: 300,
            fragment_debounce_ms: 200,
            friction: viewer.friction,
            fling_stop_velocity: viewer.fling_stop_velocity,
            velocity_window_ms: viewer.velocity_window_ms,
            double_tap_ladder: viewer.double_tap_ladder,
            spring_stiffness: viewer.spring_stiffness,
            worker_threads: default_worker_threads(),
            worker_poll_interval_ms: 5,
            initial_page: None,
            cache: None,
        }
    }
}

impl ReaderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_spacing(mut self, spacing: f32) -> Self {
        self.spacing = spacing;
        self
    }

    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn with_zoom_range(mut self, min_zoom: f32, max_zoom: f32) -> Self {
        self.min_zoom = min_zoom;
        self.max_zoom = max_zoom;
        self
    }

    /// Set both debounce windows in milliseconds.
    pub fn with_debounce(mut self, full_page_ms: u64, fragment_ms: u64) -> Self {
        self.full_page_debounce_ms = full_page_ms;
        self.fragment_debounce_ms = fragment_ms;
        self
    }

    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads;
        self
    }

    pub fn with_initial_page(mut self, page: usize) -> Self {
        self.initial_page = Some(page);
        self
    }

    /// Enable caching with the given cache configuration.
    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Check values that would make the viewer misbehave.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.min_zoom > 0.0 && self.min_zoom <= self.max_zoom) {
            return Err(ConfigError::InvalidValue(format!(
                "zoom range {}..{}",
                self.min_zoom, self.max_zoom
            )));
        }
        if self.spacing < 0.0 || !self.spacing.is_finite() {
            return Err(ConfigError::InvalidValue(format!("spacing {}", self.spacing)));
        }
        if self.double_tap_ladder.is_empty() {
            return Err(ConfigError::InvalidValue("empty double_tap_ladder".into()));
        }
        if self.friction <= 0.0 {
            return Err(ConfigError::InvalidValue(format!("friction {}", self.friction)));
        }
        if self.worker_threads == 0 {
            return Err(ConfigError::InvalidValue("worker_threads 0".into()));
        }
        Ok(())
    }

    /// The gesture and layout subset used by the viewport controller.
    pub fn viewer_config(&self) -> ViewerConfig {
        ViewerConfig {
            spacing: self.spacing,
            orientation: self.orientation,
            min_zoom: self.min_zoom,
            max_zoom: self.max_zoom,
            prefetch_margin: self.prefetch_margin,
            friction: self.friction,
            fling_stop_velocity: self.fling_stop_velocity,
            velocity_window_ms: self.velocity_window_ms,
            double_tap_ladder: self.double_tap_ladder.clone(),
            spring_stiffness: self.spring_stiffness,
        }
    }

    pub fn worker_pool_config(&self) -> WorkerPoolConfig {
        WorkerPoolConfig::new(self.worker_threads)
            .with_poll_interval(Duration::from_millis(self.worker_poll_interval_ms))
    }

    /// Defaults with environment overrides applied.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_overrides()
    }

    /// Apply environment overrides on top of this configuration.
    ///
    /// - `PAGEFLOW_SPACING`, `PAGEFLOW_MIN_ZOOM`, `PAGEFLOW_MAX_ZOOM`
    /// - `PAGEFLOW_ORIENTATION`: `vertical` or `horizontal`
    /// - `PAGEFLOW_WORKER_THREADS`, `PAGEFLOW_INITIAL_PAGE`
    /// - `PAGEFLOW_CACHE`: `0`/`off` disables caching, `1`/`on` enables it
    ///   with defaults
    ///
    /// The cache's own variables are applied when caching is enabled.
    pub fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        if let Some(spacing) = env_parse("PAGEFLOW_SPACING")? {
            self.spacing = spacing;
        }
        if let Some(min_zoom) = env_parse("PAGEFLOW_MIN_ZOOM")? {
            self.min_zoom = min_zoom;
        }
        if let Some(max_zoom) = env_parse("PAGEFLOW_MAX_ZOOM")? {
            self.max_zoom = max_zoom;
        }
        if let Ok(value) = std::env::var("PAGEFLOW_ORIENTATION") {
            self.orientation = match value.trim().to_ascii_lowercase().as_str() {
                "vertical" => Orientation::Vertical,
                "horizontal" => Orientation::Horizontal,
                _ => return Err(ConfigError::InvalidValue("PAGEFLOW_ORIENTATION".into())),
            };
        }
        if let Some(threads) = env_parse("PAGEFLOW_WORKER_THREADS")? {
            self.worker_threads = threads;
        }
        if let Some(page) = env_parse("PAGEFLOW_INITIAL_PAGE")? {
            self.initial_page = Some(page);
        }
        if let Ok(value) = std::env::var("PAGEFLOW_CACHE") {
            match value.trim().to_ascii_lowercase().as_str() {
                "0" | "off" | "false" => self.cache = None,
                "1" | "on" | "true" => {
                    self.cache.get_or_insert_with(CacheConfig::default);
                }
                _ => return Err(ConfigError::InvalidValue("PAGEFLOW_CACHE".into())),
            }
        }
        if let Some(cache) = self.cache.take() {
            self.cache = Some(cache.with_env_overrides()?);
        }
        Ok(self)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path.as_ref())?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        fs::write(path.as_ref(), self.to_toml()?)?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string(self)?)
    }
}

fn default_worker_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get().min(4))
        .unwrap_or(2)
}

fn env_parse<T: FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(name) {
        Ok(val) => val
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue(name.to_string())),
        Err(_) => Ok(None),
    }
}
