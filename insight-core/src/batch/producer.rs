//! 生产者能力
//!
//! 批量执行器只通过 [`Producer`] 与具体计算交互：如何为一个请求生成结果、
//! 结果缓存在哪个类别下、缓存多久、失败时用什么占位值。

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// 单个请求的生产失败
///
/// 只在批内部消化，转换为兜底值，不会作为批级错误传播。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProducerError {
    /// 计算失败
    #[error("producer failed: {0}")]
    Failed(String),

    /// 计算成功但结果为空
    #[error("producer returned an empty result")]
    EmptyResult,

    /// 超时
    #[error("producer timed out after {0:?}")]
    Timeout(Duration),

    /// 计算过程中 panic
    #[error("producer panicked: {0}")]
    Panicked(String),
}

impl ProducerError {
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }
}

/// 生产者
///
/// 必须可并发调用，且不自行读写缓存。
#[async_trait]
pub trait Producer: Send + Sync + 'static {
    /// 逻辑请求
    type Request: Clone + Send + Sync + 'static;

    /// 缓存类别
    fn category(&self) -> &str;

    /// 请求标识，作为结果映射的键，也用于批内去重
    fn request_id(&self, request: &Self::Request) -> String;

    /// 参与缓存键派生的参数
    fn params(&self, request: &Self::Request) -> Value;

    /// 结果缓存时长
    fn ttl(&self) -> Duration;

    /// 计算结果
    async fn produce(&self, request: &Self::Request) -> Result<Value, ProducerError>;

    /// 确定性的兜底值
    fn fallback(&self, request: &Self::Request) -> Value;
}
