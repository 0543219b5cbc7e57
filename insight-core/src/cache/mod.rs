//! # Cache Module
//!
//! 批量计算结果的持久化缓存层。
//!
//! ## 模块结构
//!
//! - `key`: 参数规范化与缓存键派生
//! - `entry`: 缓存条目与持久化格式
//! - `backend`: 存储介质 (文件目录 / 内存)
//! - `clock`: 时间源
//! - `metrics`: 运行指标
//! - `store`: 缓存存储核心实现
//!
//! ## 特性
//!
//! - TTL 支持，过期条目视为不存在
//! - 损坏条目视为不存在，并被顺手或定期清理
//! - 分段锁 + 原子发布，并发安全
//! - 后台定期清理
//!
//! ## 示例
//!
//! ```rust,no_run
//! use insight_core::cache::CacheStore;
//! use insight_core::config::CacheConfig;
//! use serde_json::json;
//! use std::time::Duration;
//!
//! # async fn example() -> insight_core::Result<()> {
//! let store = CacheStore::open(&CacheConfig::file("/tmp/insight-cache")).await?;
//!
//! let params = json!({"product": "mouse"});
//! store.put("ia", &params, json!(["mouse", "Mouse Logitech G502"]), Duration::from_secs(3600)).await?;
//!
//! if let Some(value) = store.get("ia", &params).await {
//!     println!("Cache hit: {}", value);
//! }
//!
//! let removed = store.sweep_expired().await;
//! println!("Removed {} entries", removed);
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod clock;
pub mod entry;
pub mod key;
pub mod metrics;
pub mod store;

pub use backend::{CacheBackend, FileBackend, MemoryBackend};
pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::CacheEntry;
pub use key::CacheKey;
pub use metrics::{CacheMetrics, CacheMetricsSnapshot};
pub use store::{CacheStats, CacheStore};
