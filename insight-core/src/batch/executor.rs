//! # 批量执行器
//!
//! 将一批请求拆分为缓存命中和未命中，未命中的请求交给有界 worker 池计算，
//! 新结果写回缓存，最后合并为完整的结果映射。
//!
//! ## 执行流程
//!
//! ```text
//! requests ─→ 校验 ─→ 按 request_id 去重 ─→ 逐个查缓存 (只查一次)
//!                                          │
//!                          hit ←───────────┴──────────→ miss
//!                           │                             │
//!                           │                  信号量 (max_workers)
//!                           │                             │
//!                           │             produce ─→ Ok: 写缓存
//!                           │                     └─→ Err/超时/panic: 兜底值
//!                           │                             │
//!                           └──────────→ 合并 ←── JoinSet 汇合
//! ```
//!
//! ## 保证
//!
//! - 单次批内同一请求最多计算一次
//! - 同时运行的生产者调用不超过 `max_workers`
//! - 每个不同的请求在结果中恰好出现一次，单个失败不会中断整批
//! - 跨批之间不做协调，并发的两批可能重复计算同一请求

use std::collections::{BTreeMap, HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::producer::{Producer, ProducerError};
use crate::cache::CacheStore;
use crate::config::BatchConfig;
use crate::error::{InsightError, Result};

/// 单次批执行参数
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOptions {
    /// 最大并发生产者调用数
    pub max_workers: usize,
    /// 是否读写缓存
    pub use_cache: bool,
    /// 单个任务超时
    pub task_timeout: Option<Duration>,
}

impl BatchOptions {
    pub fn from_config(config: &BatchConfig) -> Self {
        Self {
            max_workers: config.max_workers,
            use_cache: true,
            task_timeout: config.task_timeout(),
        }
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    pub fn with_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    pub fn with_task_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.task_timeout = timeout;
        self
    }
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self::from_config(&BatchConfig::default())
    }
}

/// 批统计
///
/// `hits + misses + deduplicated == total`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchStats {
    /// 缓存命中数
    pub hits: usize,
    /// 派发计算的请求数
    pub misses: usize,
    /// 批内重复、未单独计算的请求数
    pub deduplicated: usize,
    /// 使用兜底值的请求数 (包含在 misses 中)
    pub fallbacks: usize,
    /// 输入请求总数
    pub total: usize,
}

/// 批结果
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchResult {
    /// request_id → 结果
    pub results_by_request: BTreeMap<String, Value>,
    pub stats: BatchStats,
}

impl BatchResult {
    pub fn get(&self, request_id: &str) -> Option<&Value> {
        self.results_by_request.get(request_id)
    }

    pub fn len(&self) -> usize {
        self.results_by_request.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results_by_request.is_empty()
    }
}

/// 执行器累计指标
#[derive(Debug, Default)]
pub struct BatchMetrics {
    batches: AtomicU64,
    requests: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    fallbacks: AtomicU64,
    timeouts: AtomicU64,
}

impl BatchMetrics {
    fn record_batch(&self, stats: &BatchStats) {
        self.batches.fetch_add(1, Ordering::Relaxed);
        self.requests.fetch_add(stats.total as u64, Ordering::Relaxed);
        self.hits.fetch_add(stats.hits as u64, Ordering::Relaxed);
        self.misses.fetch_add(stats.misses as u64, Ordering::Relaxed);
        self.fallbacks.fetch_add(stats.fallbacks as u64, Ordering::Relaxed);
    }

    fn record_timeout(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> BatchMetricsSnapshot {
        BatchMetricsSnapshot {
            batches: self.batches.load(Ordering::Relaxed),
            requests: self.requests.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            fallbacks: self.fallbacks.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
        }
    }
}

/// 执行器指标快照
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchMetricsSnapshot {
    pub batches: u64,
    pub requests: u64,
    pub hits: u64,
    pub misses: u64,
    pub fallbacks: u64,
    pub timeouts: u64,
}

/// 批量执行器
pub struct BatchExecutor {
    /// 共享缓存
    store: Arc<CacheStore>,
    /// 配置
    config: BatchConfig,
    /// 累计指标
    metrics: Arc<BatchMetrics>,
}

impl BatchExecutor {
    /// 创建新的批量执行器
    pub fn new(store: Arc<CacheStore>, config: BatchConfig) -> Self {
        Self {
            store,
            config,
            metrics: Arc::new(BatchMetrics::default()),
        }
    }

    pub fn store(&self) -> &Arc<CacheStore> {
        &self.store
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// 按配置生成的默认执行参数
    pub fn default_options(&self) -> BatchOptions {
        BatchOptions::from_config(&self.config)
    }

    pub fn metrics(&self) -> BatchMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// 执行一批请求
    ///
    /// 只有输入非法 (空批、超出批大小上限、`max_workers == 0`) 时返回错误，
    /// 且此时不会派发任何计算。
    pub async fn run<P: Producer>(
        &self,
        requests: &[P::Request],
        producer: Arc<P>,
        options: BatchOptions,
    ) -> Result<BatchResult> {
        self.validate(requests.len(), options.max_workers)?;

        // 上限未经校验时也至少保留一个 worker
        let workers = options.max_workers.min(self.config.max_workers_limit).max(1);
        if workers < options.max_workers {
            warn!(
                requested = options.max_workers,
                limit = self.config.max_workers_limit,
                "Clamping batch workers to configured limit"
            );
        }

        let start = Instant::now();
        let category = producer.category().to_string();
        let mut stats = BatchStats {
            total: requests.len(),
            ..Default::default()
        };

        // 批内去重，保留首次出现
        let mut seen = HashSet::with_capacity(requests.len());
        let mut unique = Vec::with_capacity(requests.len());
        for request in requests {
            let id = producer.request_id(request);
            if seen.insert(id.clone()) {
                unique.push((id, request.clone()));
            } else {
                stats.deduplicated += 1;
            }
        }

        // 先查缓存，只分类一次
        let mut results = BTreeMap::new();
        let mut misses = Vec::new();
        for (id, request) in unique {
            if options.use_cache {
                if let Some(cached) = self.store.get(&category, &producer.params(&request)).await {
                    results.insert(id, cached);
                    stats.hits += 1;
                    continue;
                }
            }
            misses.push((id, request));
        }
        stats.misses = misses.len();

        debug!(
            category = %category,
            hits = stats.hits,
            misses = stats.misses,
            deduplicated = stats.deduplicated,
            workers,
            "Dispatching batch"
        );

        // 派发未命中的请求
        let semaphore = Arc::new(Semaphore::new(workers));
        let mut tasks = JoinSet::new();
        let mut pending: HashMap<String, P::Request> = HashMap::with_capacity(misses.len());

        for (id, request) in misses {
            pending.insert(id.clone(), request.clone());

            let semaphore = semaphore.clone();
            let producer = producer.clone();
            let store = self.store.clone();
            let category = category.clone();
            let timeout = options.task_timeout;
            let use_cache = options.use_cache;

            tasks.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return (id, Err(ProducerError::failed("worker pool closed"))),
                };

                let outcome = produce_guarded(producer.as_ref(), &request, timeout).await;

                if let (true, Ok(value)) = (use_cache, &outcome) {
                    let params = producer.params(&request);
                    if let Err(e) = store.put(&category, &params, value.clone(), producer.ttl()).await {
                        warn!(request = %id, error = %e, "Result not cached, continuing with fresh value");
                    }
                }

                (id, outcome)
            });
        }

        // 汇合
        while let Some(joined) = tasks.join_next().await {
            let (id, outcome) = match joined {
                Ok(done) => done,
                Err(e) => {
                    warn!(error = %e, "Batch task aborted");
                    continue;
                }
            };

            let Some(request) = pending.remove(&id) else {
                continue;
            };

            match outcome {
                Ok(value) => {
                    results.insert(id, value);
                }
                Err(e) => {
                    if matches!(e, ProducerError::Timeout(_)) {
                        self.metrics.record_timeout();
                    }
                    warn!(category = %category, request = %id, error = %e, "Producer failed, using fallback");
                    results.insert(id, producer.fallback(&request));
                    stats.fallbacks += 1;
                }
            }
        }

        // 被中止的任务同样使用兜底值
        for (id, request) in pending {
            results.insert(id, producer.fallback(&request));
            stats.fallbacks += 1;
        }

        self.metrics.record_batch(&stats);
        info!(
            category = %category,
            total = stats.total,
            hits = stats.hits,
            misses = stats.misses,
            fallbacks = stats.fallbacks,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Batch finished"
        );

        Ok(BatchResult {
            results_by_request: results,
            stats,
        })
    }

    /// 校验批输入
    fn validate(&self, len: usize, max_workers: usize) -> Result<()> {
        if len == 0 {
            return Err(InsightError::invalid_request("requests must not be empty"));
        }
        if len > self.config.max_batch_size {
            return Err(InsightError::invalid_request(format!(
                "batch of {} requests exceeds the limit of {}",
                len, self.config.max_batch_size
            )));
        }
        if max_workers == 0 {
            return Err(InsightError::invalid_request("max_workers must be at least 1"));
        }
        Ok(())
    }
}

/// 带超时和 panic 保护的单次生产
async fn produce_guarded<P: Producer>(
    producer: &P,
    request: &P::Request,
    timeout: Option<Duration>,
) -> std::result::Result<Value, ProducerError> {
    let guarded = AssertUnwindSafe(producer.produce(request)).catch_unwind();

    let caught = match timeout {
        Some(limit) => match tokio::time::timeout(limit, guarded).await {
            Ok(caught) => caught,
            Err(_) => return Err(ProducerError::Timeout(limit)),
        },
        None => guarded.await,
    };

    match caught {
        Ok(result) => result,
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(ProducerError::Panicked(message))
        }
    }
}
