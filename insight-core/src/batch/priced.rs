//! 带价格的批处理
//!
//! 每个产品额外携带一个价格，价格列表不足时用默认价格补齐，多余的价格忽略。
//! 调度与合并逻辑与普通批处理完全相同。

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::executor::{BatchExecutor, BatchOptions, BatchResult};
use super::producer::Producer;
use crate::error::Result;

/// 带价格的请求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricedRequest {
    pub product: String,
    pub price: f64,
}

impl PricedRequest {
    pub fn new(product: impl Into<String>, price: f64) -> Self {
        Self {
            product: product.into(),
            price,
        }
    }
}

/// 将产品与价格逐一配对
pub fn pair_with_prices(products: &[String], prices: &[f64], default_price: f64) -> Vec<PricedRequest> {
    products
        .iter()
        .enumerate()
        .map(|(i, product)| {
            let price = prices.get(i).copied().unwrap_or(default_price);
            PricedRequest::new(product.clone(), price)
        })
        .collect()
}

impl BatchExecutor {
    /// 执行带价格的批处理
    ///
    /// 默认价格取自 `batch.default_price`。
    pub async fn run_priced<P>(
        &self,
        products: &[String],
        prices: &[f64],
        producer: Arc<P>,
        options: BatchOptions,
    ) -> Result<BatchResult>
    where
        P: Producer<Request = PricedRequest>,
    {
        let requests = pair_with_prices(products, prices, self.config().default_price);
        self.run(&requests, producer, options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn products(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_pair_pads_missing_prices() {
        let paired = pair_with_prices(&products(&["a", "b", "c"]), &[10.0], 100.0);
        assert_eq!(
            paired,
            vec![
                PricedRequest::new("a", 10.0),
                PricedRequest::new("b", 100.0),
                PricedRequest::new("c", 100.0),
            ]
        );
    }

    #[test]
    fn test_pair_ignores_surplus_prices() {
        let paired = pair_with_prices(&products(&["a"]), &[1.0, 2.0, 3.0], 100.0);
        assert_eq!(paired, vec![PricedRequest::new("a", 1.0)]);
    }

    #[test]
    fn test_pair_without_prices() {
        let paired = pair_with_prices(&products(&["a", "b"]), &[], 42.5);
        assert!(paired.iter().all(|r| r.price == 42.5));
    }
}
