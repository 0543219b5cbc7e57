//! 缓存统计指标

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// 缓存运行指标 (进程生命周期内累计)
#[derive(Debug, Default)]
pub struct CacheMetrics {
    /// 命中次数
    hits: AtomicU64,
    /// 未命中次数 (含过期、损坏、读取失败)
    misses: AtomicU64,
    /// 读到过期条目的次数
    expired_reads: AtomicU64,
    /// 读到损坏条目的次数
    corrupt_reads: AtomicU64,
    /// 写入成功次数
    writes: AtomicU64,
    /// 写入失败次数
    write_failures: AtomicU64,
    /// 清理掉的条目数
    swept: AtomicU64,
}

impl CacheMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_expired_read(&self) {
        self.expired_reads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_corrupt_read(&self) {
        self.corrupt_reads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_write_failure(&self) {
        self.write_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_swept(&self, count: usize) {
        self.swept.fetch_add(count as u64, Ordering::Relaxed);
    }

    /// 计算命中率 (0.0 - 1.0)
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let total = hits + self.misses.load(Ordering::Relaxed);
        if total == 0 {
            return 0.0;
        }
        (hits as f64) / (total as f64)
    }

    pub fn snapshot(&self) -> CacheMetricsSnapshot {
        CacheMetricsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            expired_reads: self.expired_reads.load(Ordering::Relaxed),
            corrupt_reads: self.corrupt_reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
            swept: self.swept.load(Ordering::Relaxed),
            hit_rate: self.hit_rate(),
        }
    }
}

/// 缓存统计快照
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheMetricsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub expired_reads: u64,
    pub corrupt_reads: u64,
    pub writes: u64,
    pub write_failures: u64,
    pub swept: u64,
    pub hit_rate: f64,
}
