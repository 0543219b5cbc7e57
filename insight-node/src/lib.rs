//! # Insight Node Library
//!
//! HTTP service and CLI commands for the Insight result cache.

pub mod api;
pub mod commands;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use insight_core::batch::{BatchExecutor, BatchOptions};
use insight_core::cache::CacheStore;
use insight_core::config::{Config, ConfigLoader};
use insight_core::producers::{MarketAnalysisProducer, SimilarProductsProducer};

/// Application context shared by the HTTP handlers and CLI commands
pub struct AppContext {
    /// Effective configuration
    pub config: Config,
    /// Shared cache store
    pub store: Arc<CacheStore>,
    /// Batch executor over `store`
    pub executor: BatchExecutor,
    /// Similar-product producer
    pub similar: Arc<SimilarProductsProducer>,
    /// Market analysis producer
    pub market: Arc<MarketAnalysisProducer>,
}

impl AppContext {
    /// Build the context from an already loaded configuration
    pub async fn new(config: Config) -> Result<Self> {
        let store = Arc::new(
            CacheStore::open(&config.cache)
                .await
                .context("Failed to open cache store")?,
        );
        let executor = BatchExecutor::new(store.clone(), config.batch.clone());

        Ok(Self {
            config,
            store,
            executor,
            similar: Arc::new(SimilarProductsProducer::local()),
            market: Arc::new(MarketAnalysisProducer::local()),
        })
    }

    /// Load configuration (optionally from an explicit file) and build the context
    pub async fn load(config_path: Option<&Path>) -> Result<Self> {
        let config = load_config(config_path)?;
        Self::new(config).await
    }

    /// Batch options from config, overridden by per-call values
    pub fn options(&self, max_workers: Option<usize>, use_cache: Option<bool>) -> BatchOptions {
        let mut options = self.executor.default_options();
        if let Some(workers) = max_workers {
            options = options.with_max_workers(workers);
        }
        if let Some(use_cache) = use_cache {
            options = options.with_cache(use_cache);
        }
        options
    }
}

/// Load the layered configuration
pub fn load_config(config_path: Option<&Path>) -> Result<Config> {
    let loader = match config_path {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            ConfigLoader::with_path(path)
        }
        None => ConfigLoader::new(),
    };
    loader.load().context("Failed to load configuration")
}
