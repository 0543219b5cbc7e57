//! # Insight Configuration
//!
//! Unified configuration for the cache store, the batch executor and the
//! HTTP surface.
//!
//! ## Configuration Hierarchy
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │         Environment Variables           │
//! │    INSIGHT_BATCH_MAX_WORKERS=3          │
//! ├─────────────────────────────────────────┤
//! │         Config File (insight.toml)      │
//! │    [batch]                              │
//! │    max_workers = 3                      │
//! ├─────────────────────────────────────────┤
//! │         Default Values                  │
//! └─────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{InsightError, Result};

mod loader;

pub use loader::ConfigLoader;

/// Default entry TTL in seconds (1 hour)
pub const DEFAULT_TTL_SECS: u64 = 3600;

/// Default number of lock stripes in the cache store
pub const DEFAULT_LOCK_STRIPES: usize = 16;

/// Default background sweep interval in seconds (3 hours)
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 3 * 3600;

/// Default number of concurrent producer invocations per batch
pub const DEFAULT_MAX_WORKERS: usize = 3;

/// Default upper bound on requests per batch
pub const DEFAULT_MAX_BATCH_SIZE: usize = 50;

/// Default per-task producer timeout in seconds
pub const DEFAULT_TASK_TIMEOUT_SECS: u64 = 30;

/// Default price used to pad priced batches
pub const DEFAULT_PRICE: f64 = 100.0;

/// Default HTTP bind address
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:5000";

/// Trait for configuration validation
pub trait ValidateConfig {
    /// Validate configuration values
    fn validate(&self) -> Result<()>;
}

/// Configuration error helper
fn validation_error(msg: impl Into<String>) -> InsightError {
    InsightError::configuration(format!("Validation error: {}", msg.into()))
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl ValidateConfig for Config {
    fn validate(&self) -> Result<()> {
        self.cache.validate()?;
        self.batch.validate()?;
        self.server.validate()?;
        Ok(())
    }
}

/// Storage medium behind the cache store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// One JSON file per entry in `cache.dir`
    File,
    /// Process-local map, nothing survives a restart
    Memory,
}

impl std::str::FromStr for BackendKind {
    type Err = InsightError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "file" => Ok(Self::File),
            "memory" => Ok(Self::Memory),
            other => Err(InsightError::configuration(format!(
                "Unknown cache backend '{}': expected 'file' or 'memory'",
                other
            ))),
        }
    }
}

/// Cache store configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Backing medium
    #[serde(default = "default_backend")]
    pub backend: BackendKind,

    /// Directory holding cache files (file backend only)
    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,

    /// TTL applied when a caller does not give one
    #[serde(default = "default_ttl_secs")]
    pub default_ttl_secs: u64,

    /// Number of lock stripes; keys hash onto stripes
    #[serde(default = "default_lock_stripes")]
    pub lock_stripes: usize,

    /// Background sweep interval, 0 disables the sweeper
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            dir: default_cache_dir(),
            default_ttl_secs: default_ttl_secs(),
            lock_stripes: default_lock_stripes(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl CacheConfig {
    /// In-memory configuration, handy for tests
    pub fn memory() -> Self {
        Self {
            backend: BackendKind::Memory,
            ..Default::default()
        }
    }

    /// File-backed configuration rooted at `dir`
    pub fn file(dir: impl AsRef<Path>) -> Self {
        Self {
            backend: BackendKind::File,
            dir: dir.as_ref().to_path_buf(),
            ..Default::default()
        }
    }

    /// Set the number of lock stripes
    pub fn with_lock_stripes(mut self, stripes: usize) -> Self {
        self.lock_stripes = stripes;
        self
    }

    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }

    /// Sweep interval, `None` when the background sweeper is disabled
    pub fn sweep_interval(&self) -> Option<Duration> {
        if self.sweep_interval_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.sweep_interval_secs))
        }
    }
}

impl ValidateConfig for CacheConfig {
    fn validate(&self) -> Result<()> {
        if self.backend == BackendKind::File && self.dir.as_os_str().is_empty() {
            return Err(validation_error("cache.dir path cannot be empty"));
        }
        if self.default_ttl_secs == 0 {
            return Err(validation_error("cache.default_ttl_secs cannot be zero"));
        }
        if self.lock_stripes == 0 || self.lock_stripes > 1024 {
            return Err(validation_error(format!(
                "cache.lock_stripes must be in 1..=1024 (got {})",
                self.lock_stripes
            )));
        }
        Ok(())
    }
}

/// Batch executor configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BatchConfig {
    /// Workers used when the caller does not specify any
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Hard cap on caller-requested workers
    #[serde(default = "default_max_workers_limit")]
    pub max_workers_limit: usize,

    /// Requests accepted per batch
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,

    /// Per-task producer timeout, 0 disables
    #[serde(default = "default_task_timeout_secs")]
    pub task_timeout_secs: u64,

    /// Price used when a priced batch has fewer prices than products
    #[serde(default = "default_price")]
    pub default_price: f64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            max_workers_limit: default_max_workers_limit(),
            max_batch_size: default_max_batch_size(),
            task_timeout_secs: default_task_timeout_secs(),
            default_price: default_price(),
        }
    }
}

impl BatchConfig {
    pub fn task_timeout(&self) -> Option<Duration> {
        if self.task_timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.task_timeout_secs))
        }
    }
}

impl ValidateConfig for BatchConfig {
    fn validate(&self) -> Result<()> {
        if self.max_workers == 0 {
            return Err(validation_error("batch.max_workers cannot be zero"));
        }
        if self.max_workers_limit < self.max_workers {
            return Err(validation_error(format!(
                "batch.max_workers_limit ({}) must be >= batch.max_workers ({})",
                self.max_workers_limit, self.max_workers
            )));
        }
        if self.max_batch_size == 0 {
            return Err(validation_error("batch.max_batch_size cannot be zero"));
        }
        if !self.default_price.is_finite() || self.default_price < 0.0 {
            return Err(validation_error("batch.default_price must be a non-negative number"));
        }
        Ok(())
    }
}

/// HTTP surface configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Address the HTTP server binds to
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
        }
    }
}

impl ValidateConfig for ServerConfig {
    fn validate(&self) -> Result<()> {
        self.bind_address
            .parse::<std::net::SocketAddr>()
            .map_err(|e| {
                validation_error(format!(
                    "server.bind_address '{}' is not a socket address: {}",
                    self.bind_address, e
                ))
            })?;
        Ok(())
    }
}

fn default_backend() -> BackendKind {
    BackendKind::File
}

/// Platform cache directory, `INSIGHT_CACHE_DIR` is applied by the loader
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .map(|d| d.join("insight"))
        .unwrap_or_else(|| PathBuf::from(".insight-cache"))
}

fn default_ttl_secs() -> u64 {
    DEFAULT_TTL_SECS
}

fn default_lock_stripes() -> usize {
    DEFAULT_LOCK_STRIPES
}

fn default_sweep_interval_secs() -> u64 {
    DEFAULT_SWEEP_INTERVAL_SECS
}

fn default_max_workers() -> usize {
    DEFAULT_MAX_WORKERS
}

fn default_max_workers_limit() -> usize {
    16
}

fn default_max_batch_size() -> usize {
    DEFAULT_MAX_BATCH_SIZE
}

fn default_task_timeout_secs() -> u64 {
    DEFAULT_TASK_TIMEOUT_SECS
}

fn default_price() -> f64 {
    DEFAULT_PRICE
}

fn default_bind_address() -> String {
    DEFAULT_BIND_ADDRESS.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.batch.max_workers, 3);
        assert_eq!(config.cache.default_ttl(), Duration::from_secs(3600));
        assert_eq!(config.cache.sweep_interval(), Some(Duration::from_secs(10800)));
    }

    #[test]
    fn test_zero_values_rejected() {
        let mut config = Config::default();
        config.batch.max_workers = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.cache.lock_stripes = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.cache.default_ttl_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_worker_limit_below_default_rejected() {
        let mut config = Config::default();
        config.batch.max_workers = 8;
        config.batch.max_workers_limit = 4;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_bind_address_rejected() {
        let mut config = Config::default();
        config.server.bind_address = "not-an-address".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_disabled_timers() {
        let mut config = Config::default();
        config.cache.sweep_interval_secs = 0;
        config.batch.task_timeout_secs = 0;
        assert_eq!(config.cache.sweep_interval(), None);
        assert_eq!(config.batch.task_timeout(), None);
    }

    #[test]
    fn test_backend_kind_from_str() {
        assert_eq!("file".parse::<BackendKind>().unwrap(), BackendKind::File);
        assert_eq!("MEMORY".parse::<BackendKind>().unwrap(), BackendKind::Memory);
        assert!("redis".parse::<BackendKind>().is_err());
    }
}
