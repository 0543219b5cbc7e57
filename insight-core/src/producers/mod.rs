//! # Producers
//!
//! 内置的两个生产者：相似产品建议与市场分析。
//! 两者共享 [`SuggestionSource`]，默认使用本地关键词目录。

pub mod market;
pub mod similar;
pub mod source;

pub use market::{MarketAnalysisProducer, MARKET_CATEGORY, MARKET_TTL};
pub use similar::{SimilarProductsProducer, SIMILAR_CATEGORY, SIMILAR_TTL};
pub use source::{LocalCatalog, SuggestionSource};
