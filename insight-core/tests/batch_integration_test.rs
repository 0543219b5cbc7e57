//! 批处理集成测试
//!
//! 覆盖去重、并发上限、兜底、过期重算以及文件后端端到端流程

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use insight_core::batch::{BatchExecutor, BatchOptions, Producer, ProducerError};
use insight_core::cache::{CacheStore, ManualClock};
use insight_core::config::{BatchConfig, CacheConfig};
use insight_core::producers::{MarketAnalysisProducer, SimilarProductsProducer};
use serde_json::{json, Value};
use tempfile::TempDir;

/// 记录调用次数与并发高水位的生产者
struct RecordingProducer {
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    high_water: AtomicUsize,
    delay: Duration,
    always_fail: bool,
}

impl RecordingProducer {
    fn new(delay: Duration) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            high_water: AtomicUsize::new(0),
            delay,
            always_fail: false,
        }
    }

    fn failing() -> Self {
        Self {
            always_fail: true,
            ..Self::new(Duration::ZERO)
        }
    }
}

#[async_trait]
impl Producer for RecordingProducer {
    type Request = String;

    fn category(&self) -> &str {
        "ia"
    }

    fn request_id(&self, request: &String) -> String {
        request.clone()
    }

    fn params(&self, request: &String) -> Value {
        json!({ "product": request })
    }

    fn ttl(&self) -> Duration {
        Duration::from_secs(3600)
    }

    async fn produce(&self, request: &String) -> Result<Value, ProducerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.high_water.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.always_fail {
            return Err(ProducerError::failed("unavailable"));
        }

        let value = match request.as_str() {
            "pen" => json!(["pen A", "pen B"]),
            "notebook" => json!(["notebook X"]),
            other => json!([format!("{} X", other)]),
        };
        Ok(value)
    }

    fn fallback(&self, request: &String) -> Value {
        json!([request, format!("{} Premium", request), format!("{} Basic", request)])
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn memory_executor() -> BatchExecutor {
    BatchExecutor::new(Arc::new(CacheStore::in_memory()), BatchConfig::default())
}

#[tokio::test]
async fn test_duplicate_requests_computed_once() {
    let executor = memory_executor();
    let producer = Arc::new(RecordingProducer::new(Duration::from_millis(5)));
    let options = BatchOptions::default().with_max_workers(2);

    let result = executor
        .run(&strings(&["pen", "notebook", "pen"]), producer.clone(), options)
        .await
        .unwrap();

    assert_eq!(result.len(), 2);
    assert_eq!(result.get("pen"), Some(&json!(["pen A", "pen B"])));
    assert_eq!(result.get("notebook"), Some(&json!(["notebook X"])));

    assert_eq!(result.stats.misses, 2);
    assert_eq!(result.stats.hits, 0);
    assert_eq!(result.stats.deduplicated, 1);
    assert_eq!(result.stats.total, 3);
    assert_eq!(producer.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_completeness_invariant() {
    let executor = memory_executor();
    let producer = Arc::new(RecordingProducer::new(Duration::ZERO));

    executor
        .run(&strings(&["a", "b"]), producer.clone(), BatchOptions::default())
        .await
        .unwrap();

    let requests = strings(&["a", "b", "c", "d", "a", "c"]);
    let result = executor
        .run(&requests, producer, BatchOptions::default())
        .await
        .unwrap();

    let stats = &result.stats;
    assert_eq!(stats.hits + stats.misses + stats.deduplicated, stats.total);
    assert_eq!(stats.hits, 2);
    assert_eq!(stats.misses, 2);
    assert_eq!(stats.deduplicated, 2);
    assert_eq!(result.len(), 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrency_never_exceeds_max_workers() {
    let executor = memory_executor();
    let producer = Arc::new(RecordingProducer::new(Duration::from_millis(20)));
    let requests: Vec<String> = (0..12).map(|i| format!("item-{}", i)).collect();

    let result = executor
        .run(&requests, producer.clone(), BatchOptions::default().with_max_workers(3))
        .await
        .unwrap();

    assert_eq!(result.len(), 12);
    assert_eq!(producer.calls.load(Ordering::SeqCst), 12);
    let high_water = producer.high_water.load(Ordering::SeqCst);
    assert!(high_water <= 3, "high water mark was {}", high_water);
    assert!(high_water >= 1);
}

#[tokio::test]
async fn test_always_failing_producer_yields_fallbacks() {
    let executor = memory_executor();
    let producer = Arc::new(RecordingProducer::failing());
    let requests = strings(&["x", "y", "z"]);

    let result = executor
        .run(&requests, producer, BatchOptions::default())
        .await
        .unwrap();

    assert_eq!(result.len(), 3);
    assert_eq!(result.stats.fallbacks, 3);
    assert_eq!(result.get("y"), Some(&json!(["y", "y Premium", "y Basic"])));

    let stats = executor.store().stats().await;
    assert_eq!(stats.total_entries, 0);
}

#[tokio::test]
async fn test_expired_entries_are_recomputed() {
    let clock = ManualClock::starting_now();
    let store = CacheStore::in_memory().with_clock(Arc::new(clock.clone()));
    let executor = BatchExecutor::new(Arc::new(store), BatchConfig::default());
    let producer = Arc::new(RecordingProducer::new(Duration::ZERO));
    let requests = strings(&["pen"]);

    executor.run(&requests, producer.clone(), BatchOptions::default()).await.unwrap();

    clock.advance(Duration::from_secs(3599));
    let fresh = executor.run(&requests, producer.clone(), BatchOptions::default()).await.unwrap();
    assert_eq!(fresh.stats.hits, 1);

    clock.advance(Duration::from_secs(2));
    let stale = executor.run(&requests, producer.clone(), BatchOptions::default()).await.unwrap();
    assert_eq!(stale.stats.misses, 1);
    assert_eq!(producer.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_file_backed_batch_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let config = CacheConfig::file(temp_dir.path());
    let requests = strings(&["mouse", "teclado"]);

    {
        let store = Arc::new(CacheStore::open(&config).await.unwrap());
        let executor = BatchExecutor::new(store, BatchConfig::default());
        let result = executor
            .run(&requests, Arc::new(SimilarProductsProducer::local()), BatchOptions::default())
            .await
            .unwrap();
        assert_eq!(result.stats.misses, 2);
    }

    let json_files = std::fs::read_dir(temp_dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().map(|x| x == "json").unwrap_or(false))
        .count();
    assert_eq!(json_files, 2);

    let store = Arc::new(CacheStore::open(&config).await.unwrap());
    let executor = BatchExecutor::new(store, BatchConfig::default());
    let result = executor
        .run(&requests, Arc::new(SimilarProductsProducer::local()), BatchOptions::default())
        .await
        .unwrap();

    assert_eq!(result.stats.hits, 2);
    assert_eq!(
        result.get("mouse").unwrap()[0],
        json!("mouse")
    );

    let stats = executor.store().stats().await;
    assert_eq!(stats.valid_entries, 2);
    assert_eq!(stats.count_by_category.get("ia"), Some(&2));
}

#[tokio::test]
async fn test_priced_batch_pads_prices_and_caches_by_price() {
    let executor = memory_executor();
    let producer = Arc::new(MarketAnalysisProducer::local());
    let products = strings(&["mouse", "monitor"]);

    let result = executor
        .run_priced(&products, &[50.0], producer.clone(), BatchOptions::default())
        .await
        .unwrap();

    assert_eq!(result.len(), 2);
    let monitor = result.get("monitor").unwrap();
    assert_eq!(monitor["produtos_similares"][0]["preco"], 100.0);

    let again = executor
        .run_priced(&products, &[50.0, 100.0], producer.clone(), BatchOptions::default())
        .await
        .unwrap();
    assert_eq!(again.stats.hits, 2);
    assert_eq!(again.results_by_request, result.results_by_request);

    let repriced = executor
        .run_priced(&products, &[75.0], producer, BatchOptions::default())
        .await
        .unwrap();
    assert_eq!(repriced.stats.hits, 1);
    assert_eq!(repriced.stats.misses, 1);
}
