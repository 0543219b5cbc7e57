//! # Cache Backends
//!
//! 缓存存储介质抽象。
//!
//! - [`FileBackend`]: 每个条目一个 `<key>.json` 文件，写入采用
//!   "临时文件 + rename" 原子发布，读者永远看不到写了一半的文件
//! - [`MemoryBackend`]: 进程内 `DashMap`，用于测试或无需持久化的部署
//!
//! 后端只负责字节的读写；过期、损坏判断和锁都在 [`CacheStore`](super::CacheStore) 中。

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;

use super::key::CacheKey;
use crate::error::{InsightError, Result};

/// 条目文件扩展名
const ENTRY_EXTENSION: &str = "json";

/// 临时文件前缀 (以 `.` 开头，list_keys 时自然被忽略)
const TEMP_PREFIX: &str = ".tmp-";

/// 存储后端
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// 读取原始字节，不存在时返回 `Ok(None)`
    async fn read(&self, key: &CacheKey) -> Result<Option<Vec<u8>>>;

    /// 原子写入：并发读者只会看到旧值或新值
    async fn write(&self, key: &CacheKey, bytes: &[u8]) -> Result<()>;

    /// 删除条目，返回是否确实删除
    async fn remove(&self, key: &CacheKey) -> Result<bool>;

    /// 枚举所有已存储的键
    async fn list_keys(&self) -> Result<Vec<CacheKey>>;

    /// 后端名称 (日志用)
    fn name(&self) -> &str;
}

/// 文件目录后端
#[derive(Debug)]
pub struct FileBackend {
    dir: PathBuf,
    /// 临时文件序号，保证同进程内临时文件名唯一
    temp_seq: AtomicU64,
}

impl FileBackend {
    /// 打开 (必要时创建) 缓存目录
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            InsightError::storage(format!(
                "Failed to create cache directory '{}': {}",
                dir.display(),
                e
            ))
        })?;

        Ok(Self {
            dir,
            temp_seq: AtomicU64::new(0),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// 条目文件路径
    pub fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(format!("{}.{}", key, ENTRY_EXTENSION))
    }

    fn temp_path(&self, key: &CacheKey) -> PathBuf {
        let seq = self.temp_seq.fetch_add(1, Ordering::Relaxed);
        self.dir
            .join(format!("{}{}-{}-{}", TEMP_PREFIX, key, std::process::id(), seq))
    }
}

#[async_trait]
impl CacheBackend for FileBackend {
    async fn read(&self, key: &CacheKey) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(self.entry_path(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(InsightError::storage(format!(
                "Failed to read cache entry {}: {}",
                key, e
            ))),
        }
    }

    async fn write(&self, key: &CacheKey, bytes: &[u8]) -> Result<()> {
        let temp_path = self.temp_path(key);
        let final_path = self.entry_path(key);

        // 写入临时文件
        if let Err(e) = tokio::fs::write(&temp_path, bytes).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(InsightError::storage(format!(
                "Failed to write cache entry {}: {}",
                key, e
            )));
        }

        // 重命名为最终文件
        if let Err(e) = tokio::fs::rename(&temp_path, &final_path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(InsightError::storage(format!(
                "Failed to publish cache entry {}: {}",
                key, e
            )));
        }

        Ok(())
    }

    async fn remove(&self, key: &CacheKey) -> Result<bool> {
        match tokio::fs::remove_file(self.entry_path(key)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(InsightError::storage(format!(
                "Failed to remove cache entry {}: {}",
                key, e
            ))),
        }
    }

    async fn list_keys(&self) -> Result<Vec<CacheKey>> {
        let mut dir = tokio::fs::read_dir(&self.dir).await.map_err(|e| {
            InsightError::storage(format!(
                "Failed to list cache directory '{}': {}",
                self.dir.display(),
                e
            ))
        })?;

        let mut keys = Vec::new();
        while let Some(item) = dir.next_entry().await? {
            let path = item.path();
            if path.extension().and_then(|e| e.to_str()) != Some(ENTRY_EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if stem.starts_with('.') {
                continue;
            }
            match CacheKey::from_stored(stem) {
                Some(key) => keys.push(key),
                None => tracing::debug!(file = %path.display(), "Skipping foreign file in cache dir"),
            }
        }

        keys.sort();
        Ok(keys)
    }

    fn name(&self) -> &str {
        "file"
    }
}

/// 内存后端
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: DashMap<String, Vec<u8>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// 直接写入原始字节 (可用于注入损坏数据)
    pub fn insert_raw(&self, key: &CacheKey, bytes: impl Into<Vec<u8>>) {
        self.entries.insert(key.as_str().to_string(), bytes.into());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn read(&self, key: &CacheKey) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.get(key.as_str()).map(|v| v.value().clone()))
    }

    async fn write(&self, key: &CacheKey, bytes: &[u8]) -> Result<()> {
        // DashMap 的 insert 对单键是原子替换
        self.entries.insert(key.as_str().to_string(), bytes.to_vec());
        Ok(())
    }

    async fn remove(&self, key: &CacheKey) -> Result<bool> {
        Ok(self.entries.remove(key.as_str()).is_some())
    }

    async fn list_keys(&self) -> Result<Vec<CacheKey>> {
        let mut keys: Vec<CacheKey> = self
            .entries
            .iter()
            .filter_map(|item| CacheKey::from_stored(item.key()))
            .collect();
        keys.sort();
        Ok(keys)
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn key(product: &str) -> CacheKey {
        CacheKey::derive("ia", &json!({ "product": product }))
    }

    #[tokio::test]
    async fn test_file_backend_write_read_remove() {
        let tmp = TempDir::new().unwrap();
        let backend = FileBackend::open(tmp.path()).await.unwrap();
        let k = key("pen");

        assert_eq!(backend.read(&k).await.unwrap(), None);

        backend.write(&k, b"hello").await.unwrap();
        assert_eq!(backend.read(&k).await.unwrap(), Some(b"hello".to_vec()));
        assert!(backend.entry_path(&k).exists());

        backend.write(&k, b"world").await.unwrap();
        assert_eq!(backend.read(&k).await.unwrap(), Some(b"world".to_vec()));

        assert!(backend.remove(&k).await.unwrap());
        assert!(!backend.remove(&k).await.unwrap());
        assert_eq!(backend.read(&k).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_backend_leaves_no_temp_files() {
        let tmp = TempDir::new().unwrap();
        let backend = FileBackend::open(tmp.path()).await.unwrap();

        for i in 0..10 {
            backend.write(&key(&format!("p{}", i)), b"{}").await.unwrap();
        }

        let names: Vec<String> = std::fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 10);
        assert!(names.iter().all(|n| !n.starts_with(TEMP_PREFIX)));
    }

    #[tokio::test]
    async fn test_file_backend_list_skips_foreign_files() {
        let tmp = TempDir::new().unwrap();
        let backend = FileBackend::open(tmp.path()).await.unwrap();
        let k = key("pen");
        backend.write(&k, b"{}").await.unwrap();

        std::fs::write(tmp.path().join("README.txt"), b"not a cache file").unwrap();
        std::fs::write(tmp.path().join("notes.json"), b"{}").unwrap();
        std::fs::write(tmp.path().join(format!("{}{}", TEMP_PREFIX, "x.json")), b"{}").unwrap();

        assert_eq!(backend.list_keys().await.unwrap(), vec![k]);
    }

    #[tokio::test]
    async fn test_file_backend_creates_nested_dir() {
        let tmp = TempDir::new().unwrap();
        let nested = tmp.path().join("a").join("b");
        let backend = FileBackend::open(&nested).await.unwrap();
        assert!(nested.is_dir());
        assert_eq!(backend.dir(), nested.as_path());
    }

    #[tokio::test]
    async fn test_memory_backend() {
        let backend = MemoryBackend::new();
        let k = key("pen");

        assert!(backend.is_empty());
        backend.write(&k, b"v1").await.unwrap();
        assert_eq!(backend.read(&k).await.unwrap(), Some(b"v1".to_vec()));
        assert_eq!(backend.list_keys().await.unwrap(), vec![k.clone()]);

        backend.insert_raw(&k, "garbage");
        assert_eq!(backend.read(&k).await.unwrap(), Some(b"garbage".to_vec()));

        assert!(backend.remove(&k).await.unwrap());
        assert_eq!(backend.len(), 0);
    }
}
