//! # Batch Module
//!
//! 有界并发的批量计算。
//!
//! ## 模块结构
//!
//! - `producer`: 生产者能力与单请求错误
//! - `executor`: 批量执行器 (命中/未命中划分、worker 池、兜底、合并)
//! - `priced`: 带价格的批处理变体

pub mod executor;
pub mod priced;
pub mod producer;

pub use executor::{
    BatchExecutor, BatchMetrics, BatchMetricsSnapshot, BatchOptions, BatchResult, BatchStats,
};
pub use priced::{pair_with_prices, PricedRequest};
pub use producer::{Producer, ProducerError};
