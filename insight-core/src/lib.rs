//! # Insight Core Library
//!
//! Result cache with bounded-concurrency batch computation.
//!
//! For a set of logical requests this library either returns a previously
//! computed, still-fresh answer or computes a fresh one through an injected
//! producer, running at most `max_workers` producers at a time.
//!
//! ## Architecture
//!
//! - **Cache**: canonical keys, expiry-aware entries, file/memory backends, sweeper
//! - **Batch**: hit/miss partition, bounded worker pool, fallback policy, merge
//! - **Producers**: similar-product suggestions and market analysis
//! - **Config**: layered configuration (defaults → TOML → environment)
//!
//! ## Data flow
//!
//! ```text
//! caller → BatchExecutor::run → CacheStore::get (per unique request)
//!                             → misses → worker pool → Producer::produce
//!                             → CacheStore::put → merged result map → caller
//! ```

pub mod batch;
pub mod cache;
pub mod config;
pub mod error;
pub mod producers;

pub use batch::{BatchExecutor, BatchOptions, BatchResult, BatchStats, Producer, ProducerError};
pub use cache::{CacheStats, CacheStore};
pub use config::Config;
pub use error::{InsightError, Result};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
