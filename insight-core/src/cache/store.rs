//! # Cache Store
//!
//! 持久化、感知过期、容忍损坏的键值存储。
//!
//! ## 并发约束
//!
//! 按键哈希分段加锁 (默认 16 段，`tokio::sync::RwLock<()>`)：
//!
//! ```text
//! get            ─→ 段读锁 ─→ backend.read
//! put / remove   ─→ 段写锁 ─→ backend.write / remove
//! sweep_expired  ─→ 逐键段写锁 ─→ 重读 ─→ 过期或损坏则删除
//! ```
//!
//! 文件后端本身是 "临时文件 + rename" 原子发布，因此即便绕过锁，
//! 读者也不会看到写了一半或新旧混杂的内容。
//!
//! ## 失败语义
//!
//! - 读取失败、损坏、过期 → 一律视为未命中，绝不把错误抛给调用方
//! - 写入失败 → 返回 `StorageUnavailable`，调用方记录日志后继续使用新值

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::backend::{CacheBackend, FileBackend, MemoryBackend};
use super::clock::{Clock, SystemClock};
use super::entry::CacheEntry;
use super::key::CacheKey;
use super::metrics::{CacheMetrics, CacheMetricsSnapshot};
use crate::config::{BackendKind, CacheConfig};
use crate::error::{InsightError, Result};

/// 缓存存储
pub struct CacheStore {
    /// 存储介质
    backend: Arc<dyn CacheBackend>,
    /// 时间源
    clock: Arc<dyn Clock>,
    /// 分段锁
    stripes: Vec<RwLock<()>>,
    /// 默认 TTL
    default_ttl: Duration,
    /// 运行指标
    metrics: CacheMetrics,
}

impl CacheStore {
    /// 使用给定后端创建缓存存储
    pub fn new(backend: Arc<dyn CacheBackend>, config: &CacheConfig) -> Self {
        let stripes = (0..config.lock_stripes.max(1))
            .map(|_| RwLock::new(()))
            .collect();

        Self {
            backend,
            clock: Arc::new(SystemClock),
            stripes,
            default_ttl: config.default_ttl(),
            metrics: CacheMetrics::new(),
        }
    }

    /// 按配置打开缓存存储
    pub async fn open(config: &CacheConfig) -> Result<Self> {
        let backend: Arc<dyn CacheBackend> = match config.backend {
            BackendKind::File => Arc::new(FileBackend::open(&config.dir).await?),
            BackendKind::Memory => Arc::new(MemoryBackend::new()),
        };

        info!(
            backend = backend.name(),
            dir = %config.dir.display(),
            stripes = config.lock_stripes,
            "Cache store opened"
        );

        Ok(Self::new(backend, config))
    }

    /// 内存缓存 (默认配置)
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()), &CacheConfig::memory())
    }

    /// 替换时间源
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    fn stripe(&self, key: &CacheKey) -> &RwLock<()> {
        &self.stripes[key.stripe(self.stripes.len())]
    }

    /// 读取缓存值
    ///
    /// 条目不存在、不可读、损坏或过期时返回 `None`。
    /// 损坏的条目会被顺手删除。
    pub async fn get(&self, category: &str, params: &Value) -> Option<Value> {
        let key = CacheKey::derive(category, params);

        let bytes = {
            let _guard = self.stripe(&key).read().await;
            match self.backend.read(&key).await {
                Ok(Some(bytes)) => bytes,
                Ok(None) => {
                    debug!(key = %key, "Cache miss");
                    self.metrics.record_miss();
                    return None;
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "Cache read failed, treating as miss");
                    self.metrics.record_miss();
                    return None;
                }
            }
        };

        match CacheEntry::from_bytes(&key, &bytes) {
            Ok(entry) if entry.category != category => {
                warn!(
                    key = %key,
                    stored = %entry.category,
                    requested = %category,
                    "Cache entry category mismatch, treating as miss"
                );
                self.metrics.record_miss();
                None
            }
            Ok(entry) if entry.is_fresh(self.clock.now()) => {
                debug!(key = %key, "Cache hit");
                self.metrics.record_hit();
                Some(entry.payload)
            }
            Ok(entry) => {
                debug!(key = %key, expired_at = %entry.expires_at, "Cache entry expired");
                self.metrics.record_expired_read();
                self.metrics.record_miss();
                None
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Corrupt cache entry, treating as miss");
                self.metrics.record_corrupt_read();
                self.metrics.record_miss();
                self.discard_corrupt(&key, &bytes).await;
                None
            }
        }
    }

    /// 写入缓存值，`created_at` 取当前时间
    pub async fn put(
        &self,
        category: &str,
        params: &Value,
        payload: Value,
        ttl: Duration,
    ) -> Result<()> {
        let key = CacheKey::derive(category, params);
        let entry = CacheEntry::new(
            &key,
            category,
            params.clone(),
            payload,
            ttl_seconds(ttl),
            self.clock.now(),
        );
        let bytes = entry.to_bytes()?;

        let result = {
            let _guard = self.stripe(&key).write().await;
            self.backend.write(&key, &bytes).await
        };

        match result {
            Ok(()) => {
                debug!(key = %key, ttl_secs = entry.ttl_seconds, "Cache saved");
                self.metrics.record_write();
                Ok(())
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Cache write failed");
                self.metrics.record_write_failure();
                Err(match e {
                    InsightError::StorageUnavailable(msg) => InsightError::StorageUnavailable(msg),
                    other => InsightError::storage(other.to_string()),
                })
            }
        }
    }

    /// 使用默认 TTL 写入
    pub async fn put_default(&self, category: &str, params: &Value, payload: Value) -> Result<()> {
        self.put(category, params, payload, self.default_ttl).await
    }

    /// 使指定条目失效
    pub async fn remove(&self, category: &str, params: &Value) -> Result<bool> {
        let key = CacheKey::derive(category, params);
        let _guard = self.stripe(&key).write().await;
        self.backend.remove(&key).await
    }

    /// 清理过期和损坏的条目
    ///
    /// 可与 get/put 并发执行。枚举之后被他人删除的键直接跳过。
    ///
    /// # 返回
    /// - 删除的条目数
    pub async fn sweep_expired(&self) -> usize {
        let keys = match self.backend.list_keys().await {
            Ok(keys) => keys,
            Err(e) => {
                warn!(error = %e, "Cache sweep could not list entries");
                return 0;
            }
        };

        let mut removed = 0;
        for key in keys {
            let _guard = self.stripe(&key).write().await;

            let bytes = match self.backend.read(&key).await {
                Ok(Some(bytes)) => bytes,
                Ok(None) => continue,
                Err(e) => {
                    warn!(key = %key, error = %e, "Cache sweep could not read entry");
                    continue;
                }
            };

            let reason = match CacheEntry::from_bytes(&key, &bytes) {
                Ok(entry) if entry.is_fresh(self.clock.now()) => continue,
                Ok(_) => "expired",
                Err(_) => "corrupt",
            };

            match self.backend.remove(&key).await {
                Ok(true) => {
                    debug!(key = %key, reason, "Removed cache entry");
                    removed += 1;
                }
                Ok(false) => {}
                Err(e) => warn!(key = %key, error = %e, "Cache sweep could not remove entry"),
            }
        }

        self.metrics.record_swept(removed);
        info!(removed, "Cache sweep finished");
        removed
    }

    /// 缓存统计快照 (尽力而为，无法解析的条目不计入分类)
    pub async fn stats(&self) -> CacheStats {
        let mut stats = CacheStats::default();

        let keys = match self.backend.list_keys().await {
            Ok(keys) => keys,
            Err(e) => {
                warn!(error = %e, "Cache stats could not list entries");
                return stats;
            }
        };

        let now = self.clock.now();
        for key in keys {
            let bytes = {
                let _guard = self.stripe(&key).read().await;
                match self.backend.read(&key).await {
                    Ok(Some(bytes)) => bytes,
                    _ => continue,
                }
            };

            stats.total_entries += 1;
            stats.total_size_bytes += bytes.len() as u64;

            let Ok(entry) = CacheEntry::from_bytes(&key, &bytes) else {
                continue;
            };

            *stats.count_by_category.entry(entry.category.clone()).or_insert(0) += 1;
            if entry.is_fresh(now) {
                stats.valid_entries += 1;
            } else {
                stats.expired_entries += 1;
            }
        }

        stats
    }

    /// 运行指标快照
    pub fn metrics(&self) -> CacheMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// 启动后台过期清理任务
    ///
    /// 与请求处理完全解耦；没有它也不影响正确性，只影响存储增长。
    ///
    /// # 参数
    /// - `interval`: 清理间隔
    pub fn start_sweeper(self: Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut timer = tokio::time::interval(interval);
            timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                timer.tick().await;
                let count = self.sweep_expired().await;
                if count > 0 {
                    debug!("Removed {} expired cache entries", count);
                }
            }
        })
    }

    /// 删除仍然损坏的条目
    ///
    /// 升级为写锁后重读，只有内容与读到的损坏字节一致时才删除，
    /// 避免误删他人刚写入的新值。
    async fn discard_corrupt(&self, key: &CacheKey, seen: &[u8]) {
        let _guard = self.stripe(key).write().await;
        match self.backend.read(key).await {
            Ok(Some(current)) if current == seen => {
                if let Err(e) = self.backend.remove(key).await {
                    warn!(key = %key, error = %e, "Failed to remove corrupt cache entry");
                }
            }
            _ => {}
        }
    }
}

/// 整秒存储的 TTL，不足一秒的部分向上取整
fn ttl_seconds(ttl: Duration) -> u64 {
    ttl.as_secs() + u64::from(ttl.subsec_nanos() > 0)
}

/// 缓存存储统计
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    /// 所有条目 (含无法解析的)
    pub total_entries: usize,
    /// 未过期条目
    pub valid_entries: usize,
    /// 已过期条目
    pub expired_entries: usize,
    /// 按类别计数
    pub count_by_category: BTreeMap<String, usize>,
    /// 占用字节数
    pub total_size_bytes: u64,
}

impl CacheStats {
    /// 可读的大小 (KB / MB)
    pub fn human_size(&self) -> String {
        const KB: f64 = 1024.0;
        const MB: f64 = 1024.0 * 1024.0;

        let bytes = self.total_size_bytes as f64;
        if bytes > MB {
            format!("{:.2} MB", bytes / MB)
        } else {
            format!("{:.2} KB", bytes / KB)
        }
    }

    /// 无法解析的条目数
    pub fn unreadable_entries(&self) -> usize {
        self.total_entries
            .saturating_sub(self.valid_entries + self.expired_entries)
    }
}
