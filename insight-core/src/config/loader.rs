//! # Configuration Loader
//!
//! Loads and merges configuration from multiple sources:
//! 1. Default values (lowest priority)
//! 2. Configuration file (middle priority)
//! 3. Environment variables (highest priority)

use std::env;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::{BackendKind, Config, ValidateConfig};
use crate::error::{InsightError, Result};

/// Configuration loader with support for file and environment variable overrides
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Path to configuration file
    config_path: PathBuf,

    /// Environment variable prefix
    env_prefix: String,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self {
            config_path: Self::default_config_path(),
            env_prefix: "INSIGHT".to_string(),
        }
    }
}

impl ConfigLoader {
    /// Create a new config loader with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a config loader with a specific config file path
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: path.into(),
            env_prefix: "INSIGHT".to_string(),
        }
    }

    /// Use a custom environment prefix
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Get the default configuration file path
    fn default_config_path() -> PathBuf {
        if let Ok(config_path) = env::var("INSIGHT_CONFIG") {
            return PathBuf::from(config_path);
        }

        let possible_paths = [
            PathBuf::from("insight.toml"),
            dirs::config_dir()
                .map(|d| d.join("insight").join("config.toml"))
                .unwrap_or_else(|| PathBuf::from("/etc/insight/config.toml")),
            PathBuf::from("/etc/insight/config.toml"),
        ];

        for path in &possible_paths {
            if path.exists() {
                return path.clone();
            }
        }

        possible_paths[0].clone()
    }

    /// Load configuration with full hierarchy
    pub fn load(&self) -> Result<Config> {
        let mut config = Config::default();

        if self.config_path.exists() {
            let file_config = self.load_from_file()?;
            config = merge_file_config(config, file_config);
        }

        config = self.merge_env_config(config)?;

        config.validate().map_err(|e| {
            InsightError::configuration(format!("Configuration validation failed: {}", e))
        })?;

        Ok(config)
    }

    /// Load configuration from file
    fn load_from_file(&self) -> Result<FileConfig> {
        let content = std::fs::read_to_string(&self.config_path).map_err(|e| {
            InsightError::configuration(format!(
                "Failed to read config file '{}': {}",
                self.config_path.display(),
                e
            ))
        })?;

        toml::from_str(&content).map_err(|e| {
            InsightError::configuration(format!(
                "Failed to parse config file '{}': {}",
                self.config_path.display(),
                e
            ))
        })
    }

    /// Merge environment variable configuration
    fn merge_env_config(&self, mut config: Config) -> Result<Config> {
        let var = |name: &str| env::var(format!("{}_{}", self.env_prefix, name));

        // Cache
        if let Ok(val) = var("CACHE_BACKEND") {
            config.cache.backend = val.parse::<BackendKind>()?;
        }
        if let Ok(val) = var("CACHE_DIR") {
            config.cache.dir = PathBuf::from(val);
        }
        if let Ok(val) = var("CACHE_DEFAULT_TTL_SECS") {
            config.cache.default_ttl_secs = parse_u64(&val, "CACHE_DEFAULT_TTL_SECS")?;
        }
        if let Ok(val) = var("CACHE_LOCK_STRIPES") {
            config.cache.lock_stripes = parse_usize(&val, "CACHE_LOCK_STRIPES")?;
        }
        if let Ok(val) = var("CACHE_SWEEP_INTERVAL_SECS") {
            config.cache.sweep_interval_secs = parse_u64(&val, "CACHE_SWEEP_INTERVAL_SECS")?;
        }

        // Batch
        if let Ok(val) = var("BATCH_MAX_WORKERS") {
            config.batch.max_workers = parse_usize(&val, "BATCH_MAX_WORKERS")?;
        }
        if let Ok(val) = var("BATCH_MAX_WORKERS_LIMIT") {
            config.batch.max_workers_limit = parse_usize(&val, "BATCH_MAX_WORKERS_LIMIT")?;
        }
        if let Ok(val) = var("BATCH_MAX_BATCH_SIZE") {
            config.batch.max_batch_size = parse_usize(&val, "BATCH_MAX_BATCH_SIZE")?;
        }
        if let Ok(val) = var("BATCH_TASK_TIMEOUT_SECS") {
            config.batch.task_timeout_secs = parse_u64(&val, "BATCH_TASK_TIMEOUT_SECS")?;
        }
        if let Ok(val) = var("BATCH_DEFAULT_PRICE") {
            config.batch.default_price = parse_f64(&val, "BATCH_DEFAULT_PRICE")?;
        }

        // Server
        if let Ok(val) = var("SERVER_BIND_ADDRESS") {
            config.server.bind_address = val;
        }

        Ok(config)
    }

    /// Get the configuration file path
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Create a default configuration file template
    pub fn create_template(&self) -> String {
        r#"# Insight Configuration File
# Generated template - modify as needed

[cache]
backend = "file"            # "file" or "memory"
# dir = "/var/cache/insight"
default_ttl_secs = 3600
lock_stripes = 16
sweep_interval_secs = 10800  # 0 disables the background sweeper

[batch]
max_workers = 3
max_workers_limit = 16
max_batch_size = 50
task_timeout_secs = 30       # 0 disables the per-task timeout
default_price = 100.0

[server]
bind_address = "127.0.0.1:5000"
"#
        .to_string()
    }
}

/// Merge file configuration into default configuration
fn merge_file_config(mut base: Config, file: FileConfig) -> Config {
    if let Some(cache) = file.cache {
        if let Some(backend) = cache.backend {
            base.cache.backend = backend;
        }
        if let Some(dir) = cache.dir {
            base.cache.dir = dir;
        }
        if let Some(ttl) = cache.default_ttl_secs {
            base.cache.default_ttl_secs = ttl;
        }
        if let Some(stripes) = cache.lock_stripes {
            base.cache.lock_stripes = stripes;
        }
        if let Some(interval) = cache.sweep_interval_secs {
            base.cache.sweep_interval_secs = interval;
        }
    }

    if let Some(batch) = file.batch {
        if let Some(workers) = batch.max_workers {
            base.batch.max_workers = workers;
        }
        if let Some(limit) = batch.max_workers_limit {
            base.batch.max_workers_limit = limit;
        }
        if let Some(size) = batch.max_batch_size {
            base.batch.max_batch_size = size;
        }
        if let Some(timeout) = batch.task_timeout_secs {
            base.batch.task_timeout_secs = timeout;
        }
        if let Some(price) = batch.default_price {
            base.batch.default_price = price;
        }
    }

    if let Some(server) = file.server {
        if let Some(addr) = server.bind_address {
            base.server.bind_address = addr;
        }
    }

    base
}

/// Parse a u64 from string
fn parse_u64(s: &str, name: &str) -> Result<u64> {
    s.parse::<u64>().map_err(|e| {
        InsightError::configuration(format!(
            "Invalid {} '{}': must be a valid number. Error: {}",
            name, s, e
        ))
    })
}

/// Parse a usize from string
fn parse_usize(s: &str, name: &str) -> Result<usize> {
    s.parse::<usize>().map_err(|e| {
        InsightError::configuration(format!(
            "Invalid {} '{}': must be a valid number. Error: {}",
            name, s, e
        ))
    })
}

/// Parse an f64 from string
fn parse_f64(s: &str, name: &str) -> Result<f64> {
    s.parse::<f64>().map_err(|e| {
        InsightError::configuration(format!(
            "Invalid {} '{}': must be a valid decimal. Error: {}",
            name, s, e
        ))
    })
}

/// Configuration structure for file-based config
/// Uses Option for all fields to allow partial configuration
#[derive(Debug, Clone, Deserialize)]
struct FileConfig {
    #[serde(default)]
    pub cache: Option<FileCacheConfig>,
    #[serde(default)]
    pub batch: Option<FileBatchConfig>,
    #[serde(default)]
    pub server: Option<FileServerConfig>,
}

#[derive(Debug, Clone, Deserialize)]
struct FileCacheConfig {
    pub backend: Option<BackendKind>,
    pub dir: Option<PathBuf>,
    pub default_ttl_secs: Option<u64>,
    pub lock_stripes: Option<usize>,
    pub sweep_interval_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
struct FileBatchConfig {
    pub max_workers: Option<usize>,
    pub max_workers_limit: Option<usize>,
    pub max_batch_size: Option<usize>,
    pub task_timeout_secs: Option<u64>,
    pub default_price: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
struct FileServerConfig {
    pub bind_address: Option<String>,
}
