//! 相似产品生产者

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::source::{LocalCatalog, SuggestionSource};
use crate::batch::{Producer, ProducerError};

/// 缓存类别
pub const SIMILAR_CATEGORY: &str = "ia";

/// 结果缓存 24 小时
pub const SIMILAR_TTL: Duration = Duration::from_secs(24 * 3600);

/// 相似产品生产者
///
/// 结果为 `[product, suggestion...]`。
pub struct SimilarProductsProducer {
    source: Arc<dyn SuggestionSource>,
}

impl SimilarProductsProducer {
    pub fn new(source: Arc<dyn SuggestionSource>) -> Self {
        Self { source }
    }

    /// 使用本地关键词目录
    pub fn local() -> Self {
        Self::new(Arc::new(LocalCatalog::new()))
    }

    fn basic_variants(product: &str) -> Vec<String> {
        vec![format!("{} Premium", product), format!("{} Basic", product)]
    }
}

#[async_trait]
impl Producer for SimilarProductsProducer {
    type Request = String;

    fn category(&self) -> &str {
        SIMILAR_CATEGORY
    }

    fn request_id(&self, request: &String) -> String {
        request.clone()
    }

    fn params(&self, request: &String) -> Value {
        json!({ "product": request })
    }

    fn ttl(&self) -> Duration {
        SIMILAR_TTL
    }

    async fn produce(&self, request: &String) -> Result<Value, ProducerError> {
        let mut suggestions = self.source.suggest(request).await?;
        if suggestions.is_empty() {
            suggestions = Self::basic_variants(request);
        }

        let mut result = Vec::with_capacity(suggestions.len() + 1);
        result.push(request.clone());
        result.extend(suggestions);
        Ok(json!(result))
    }

    fn fallback(&self, request: &String) -> Value {
        let mut result = vec![request.clone()];
        result.extend(Self::basic_variants(request));
        json!(result)
    }
}
