//! 市场分析生产者

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::{json, Value};

use super::source::{LocalCatalog, SuggestionSource};
use crate::batch::{PricedRequest, Producer, ProducerError};

/// 缓存类别
pub const MARKET_CATEGORY: &str = "market_analysis";

/// 结果缓存 1 小时
pub const MARKET_TTL: Duration = Duration::from_secs(3600);

/// 销量序列长度 (月)
const SALES_MONTHS: usize = 6;

const POSSIBLE_EVENTS: &[&str] = &[
    "Black Friday se aproximando - aumento esperado em vendas",
    "Volta às aulas - oportunidade para promoções",
    "Novo lançamento do concorrente principal no próximo mês",
    "Tendência de alta para produtos importados",
    "Crescimento acelerado do mercado online",
    "Dia das mães se aproximando - oportunidade para promoções",
    "Natal se aproximando - alta demanda para presentes",
    "Aumento de impostos para produtos importados anunciado",
];

const FALLBACK_EVENTS: &[&str] = &[
    "Aumento de demanda previsto para os próximos meses",
    "Tendência de crescimento no mercado online",
];

/// 市场分析生产者
///
/// 为每个 (产品, 价格) 生成相似产品的价格、趋势和近 6 个月销量。
pub struct MarketAnalysisProducer {
    source: Arc<dyn SuggestionSource>,
}

impl MarketAnalysisProducer {
    pub fn new(source: Arc<dyn SuggestionSource>) -> Self {
        Self { source }
    }

    /// 使用本地关键词目录
    pub fn local() -> Self {
        Self::new(Arc::new(LocalCatalog::new()))
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

fn sales<R: Rng>(rng: &mut R, low: u32, high: u32) -> Vec<u32> {
    (0..SALES_MONTHS).map(|_| rng.gen_range(low..=high)).collect()
}

/// 根据建议列表生成分析结果
pub fn build_analysis<R: Rng>(rng: &mut R, request: &PricedRequest, suggestions: &[String]) -> Value {
    let price = request.price;
    let mut similar = Vec::with_capacity(suggestions.len() + 1);

    similar.push(json!({
        "nome": request.product,
        "preco": price,
        "tendencia": round_to(rng.gen_range(-5.0..=10.0), 1),
        "vendas": sales(rng, 75, 120),
    }));

    for name in suggestions {
        let variation: f64 = rng.gen_range(-0.2..=0.2);
        similar.push(json!({
            "nome": name,
            "preco": round_to(price * (1.0 + variation), 2),
            "tendencia": round_to(rng.gen_range(-10.0..=15.0), 1),
            "vendas": sales(rng, 50, 150),
        }));
    }

    let count = rng.gen_range(2..=3);
    let events: Vec<&str> = POSSIBLE_EVENTS.choose_multiple(rng, count).copied().collect();

    json!({
        "produtos_similares": similar,
        "tendencia_original": round_to(rng.gen_range(-5.0..=10.0), 1),
        "vendas_original": sales(rng, 75, 120),
        "eventos": events,
    })
}

#[async_trait]
impl Producer for MarketAnalysisProducer {
    type Request = PricedRequest;

    fn category(&self) -> &str {
        MARKET_CATEGORY
    }

    fn request_id(&self, request: &PricedRequest) -> String {
        request.product.clone()
    }

    fn params(&self, request: &PricedRequest) -> Value {
        json!({ "produto": request.product, "preco": request.price })
    }

    fn ttl(&self) -> Duration {
        MARKET_TTL
    }

    async fn produce(&self, request: &PricedRequest) -> Result<Value, ProducerError> {
        if !request.price.is_finite() {
            return Err(ProducerError::failed(format!("invalid price {}", request.price)));
        }

        let mut suggestions = self.source.suggest(&request.product).await?;
        if suggestions.is_empty() {
            suggestions = vec![
                format!("{} Premium", request.product),
                format!("{} Basic", request.product),
            ];
        }

        Ok(build_analysis(&mut rand::thread_rng(), request, &suggestions))
    }

    fn fallback(&self, request: &PricedRequest) -> Value {
        let product = &request.product;
        let price = request.price;
        json!({
            "produtos_similares": [
                {
                    "nome": product,
                    "preco": price,
                    "tendencia": 5.0,
                    "vendas": [80, 85, 90, 88, 92, 95],
                },
                {
                    "nome": format!("{} Premium", product),
                    "preco": round_to(price * 1.2, 2),
                    "tendencia": 8.5,
                    "vendas": [70, 75, 85, 90, 95, 100],
                },
                {
                    "nome": format!("{} Basic", product),
                    "preco": round_to(price * 0.8, 2),
                    "tendencia": 3.2,
                    "vendas": [60, 65, 68, 70, 75, 78],
                },
            ],
            "eventos": FALLBACK_EVENTS,
        })
    }
}
