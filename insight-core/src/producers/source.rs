//! 相似产品建议来源

use async_trait::async_trait;

use crate::batch::ProducerError;

/// 单个产品最多返回的建议数
pub const MAX_SUGGESTIONS: usize = 3;

/// 相似产品建议来源
#[async_trait]
pub trait SuggestionSource: Send + Sync + 'static {
    async fn suggest(&self, product: &str) -> Result<Vec<String>, ProducerError>;
}

/// 本地关键词目录
///
/// 按产品名中的关键词匹配固定候选列表，未匹配时生成通用变体。
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalCatalog;

const CATALOG: &[(&[&str], &[&str])] = &[
    (
        &["notebook", "laptop"],
        &["Notebook Dell Inspiron 15", "Laptop HP Pavilion", "Notebook Lenovo ThinkPad"],
    ),
    (
        &["mouse"],
        &["Mouse Logitech G502", "Mouse Razer DeathAdder", "Mouse sem fio Microsoft"],
    ),
    (
        &["teclado"],
        &["Teclado Mecânico Redragon", "Teclado Logitech K380", "Teclado Gamer RGB"],
    ),
    (
        &["monitor"],
        &["Monitor Samsung 24\"", "Monitor LG UltraWide", "Monitor Dell 27\""],
    ),
    (
        &["headset", "fone"],
        &["Headset HyperX Cloud", "Fone JBL Tune", "Headset Gamer Razer"],
    ),
    (
        &["caneta", "lápis"],
        &["Caneta BIC", "Lápis Faber-Castell", "Caneta Pilot"],
    ),
    (
        &["camisa", "camiseta"],
        &["Camiseta Nike", "Camiseta Adidas", "Camisa Polo Lacoste"],
    ),
    (
        &["celular", "smartphone"],
        &["iPhone 14", "Samsung Galaxy S22", "Xiaomi Redmi Note"],
    ),
    (
        &["televisão", "tv"],
        &["TV Samsung 55\"", "Smart TV LG 50\"", "TV 4K Sony"],
    ),
];

impl LocalCatalog {
    pub fn new() -> Self {
        Self
    }

    /// 同步查找建议
    pub fn lookup(&self, product: &str) -> Vec<String> {
        let lower = product.to_lowercase();

        let matched = CATALOG
            .iter()
            .find(|(keywords, _)| keywords.iter().any(|k| lower.contains(k)));

        let suggestions: Vec<String> = match matched {
            Some((_, items)) => items.iter().map(|s| s.to_string()).collect(),
            None => vec![
                format!("{} Premium", product),
                format!("{} Plus", product),
                format!("{} Básico", product),
            ],
        };

        suggestions.into_iter().take(MAX_SUGGESTIONS).collect()
    }
}

#[async_trait]
impl SuggestionSource for LocalCatalog {
    async fn suggest(&self, product: &str) -> Result<Vec<String>, ProducerError> {
        Ok(self.lookup(product))
    }
}
