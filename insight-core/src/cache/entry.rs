//! 缓存条目及其持久化格式

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::key::CacheKey;
use crate::error::{InsightError, Result};

/// 缓存条目
///
/// 持久化为单个 JSON 记录。`created_at`/`expires_at` 以 RFC 3339 存储，
/// 进程重启后过期判断依然成立。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// 缓存键
    pub key: String,
    /// 类别 (`ia`, `market_analysis` 等)
    pub category: String,
    /// 原始参数，仅用于诊断
    pub params: Value,
    /// 创建时间
    pub created_at: DateTime<Utc>,
    /// 存活秒数
    pub ttl_seconds: u64,
    /// 过期时间 (冗余字段，便于人工查看)
    pub expires_at: DateTime<Utc>,
    /// 缓存的值
    pub payload: Value,
}

impl CacheEntry {
    /// 创建新缓存条目
    pub fn new(
        key: &CacheKey,
        category: &str,
        params: Value,
        payload: Value,
        ttl_seconds: u64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            key: key.as_str().to_string(),
            category: category.to_string(),
            params,
            created_at: now,
            ttl_seconds,
            expires_at: expiry_of(now, ttl_seconds),
            payload,
        }
    }

    /// 是否新鲜：`now < created_at + ttl_seconds`
    ///
    /// 恰好到达过期时刻即视为过期。
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now < expiry_of(self.created_at, self.ttl_seconds)
    }

    /// 序列化为存储字节
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// 从存储字节解析
    ///
    /// 解析失败或记录中的键与读取时的键不一致都视为损坏。
    pub fn from_bytes(expected: &CacheKey, bytes: &[u8]) -> Result<Self> {
        let entry: Self = serde_json::from_slice(bytes)
            .map_err(|e| InsightError::corrupt(format!("{}: {}", expected, e)))?;

        if entry.key != expected.as_str() {
            return Err(InsightError::corrupt(format!(
                "{}: record carries key '{}'",
                expected, entry.key
            )));
        }

        Ok(entry)
    }
}

/// 过期时刻；超出 chrono 表示范围时视为永不过期
fn expiry_of(created_at: DateTime<Utc>, ttl_seconds: u64) -> DateTime<Utc> {
    i64::try_from(ttl_seconds)
        .ok()
        .and_then(ChronoDuration::try_seconds)
        .and_then(|ttl| created_at.checked_add_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
