//! # Cache Key Derivation
//!
//! 由 (category, params) 确定性地派生缓存键。
//!
//! 参数先规范化再哈希：
//! - 对象键递归排序
//! - 字符串去除首尾空白
//! - 整数值的浮点数 (如 `100.0`) 归一为整数 (`100`)
//!
//! 因此字段顺序不同但语义相同的请求会得到同一个键。
//! 哈希使用 SHA-256，输入为原始类别、`\0` 与规范化 JSON，
//! 键格式为 `{category}_{hex}`，其中类别前缀只做文件名清洗。

use std::fmt;

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// 缓存键
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// 从类别和参数派生缓存键
    pub fn derive(category: &str, params: &Value) -> Self {
        let canonical = canonicalize(params);
        // Value 的 Display 输出紧凑 JSON；canonicalize 已保证对象键有序
        let text = canonical.to_string();

        // 原始类别参与哈希，清洗后相同的类别仍得到不同的键
        let mut hasher = Sha256::new();
        hasher.update(category.as_bytes());
        hasher.update([0u8]);
        hasher.update(text.as_bytes());
        let digest = hex::encode(hasher.finalize());

        Self(format!("{}_{}", sanitize_category(category), digest))
    }

    /// 从已存储的键名恢复 (例如文件名去掉扩展名)
    ///
    /// 不符合键格式的名称返回 `None`。
    pub fn from_stored(name: &str) -> Option<Self> {
        let (prefix, digest) = name.rsplit_once('_')?;
        let well_formed = !prefix.is_empty()
            && digest.len() == 64
            && digest.chars().all(|c| c.is_ascii_hexdigit());
        well_formed.then(|| Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 用于锁分段的稳定哈希
    pub(crate) fn stripe(&self, stripes: usize) -> usize {
        // 键尾部是十六进制摘要，直接取前 16 位即可均匀分布
        let digest = self.0.rsplit_once('_').map(|(_, d)| d).unwrap_or(&self.0);
        let head = digest.get(..16).unwrap_or(digest);
        let value = u64::from_str_radix(head, 16).unwrap_or(0);
        (value % stripes.max(1) as u64) as usize
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// 规范化参数
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();

            let mut sorted = Map::new();
            for key in keys {
                sorted.insert(key.clone(), canonicalize(&map[key]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        Value::String(s) => Value::String(s.trim().to_string()),
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                Value::from(f as i64)
            }
            _ => Value::Number(n.clone()),
        },
        other => other.clone(),
    }
}

/// 类别只保留文件名安全的字符
fn sanitize_category(category: &str) -> String {
    let cleaned: String = category
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.is_empty() {
        "default".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_same_params_same_key() {
        let a = CacheKey::derive("ia", &json!({"product": "pen"}));
        let b = CacheKey::derive("ia", &json!({"product": "pen"}));
        assert_eq!(a, b);
    }

    #[test]
    fn test_field_order_does_not_matter() {
        let a: Value = serde_json::from_str(r#"{"produto": "pen", "preco": 10}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"preco": 10, "produto": "pen"}"#).unwrap();
        assert_eq!(
            CacheKey::derive("market_analysis", &a),
            CacheKey::derive("market_analysis", &b)
        );
    }

    #[test]
    fn test_nested_objects_are_sorted() {
        let a = json!({"outer": {"b": 1, "a": [{"y": 1, "x": 2}]}});
        let b = json!({"outer": {"a": [{"x": 2, "y": 1}], "b": 1}});
        assert_eq!(CacheKey::derive("t", &a), CacheKey::derive("t", &b));
    }

    #[test]
    fn test_value_normalization() {
        assert_eq!(
            CacheKey::derive("m", &json!({"preco": 100.0, "produto": " pen "})),
            CacheKey::derive("m", &json!({"preco": 100, "produto": "pen"}))
        );
        assert_ne!(
            CacheKey::derive("m", &json!({"preco": 100.5})),
            CacheKey::derive("m", &json!({"preco": 100}))
        );
    }

    #[test]
    fn test_different_params_or_category_differ() {
        let pen = CacheKey::derive("ia", &json!({"product": "pen"}));
        let book = CacheKey::derive("ia", &json!({"product": "notebook"}));
        let other = CacheKey::derive("trends", &json!({"product": "pen"}));
        assert_ne!(pen, book);
        assert_ne!(pen, other);
    }

    #[test]
    fn test_categories_with_same_sanitized_form_differ() {
        let params = json!({"product": "pen"});
        let spaced = CacheKey::derive("market analysis", &params);
        let underscored = CacheKey::derive("market_analysis", &params);
        assert_ne!(spaced, underscored);
        assert!(spaced.as_str().starts_with("market_analysis_"));
        assert!(underscored.as_str().starts_with("market_analysis_"));

        assert_ne!(CacheKey::derive("", &params), CacheKey::derive("default", &params));
    }

    #[test]
    fn test_key_format() {
        let key = CacheKey::derive("market analysis/v2", &json!({"x": 1}));
        assert!(key.as_str().starts_with("market_analysis_v2_"));
        assert_eq!(CacheKey::from_stored(key.as_str()), Some(key.clone()));
    }

    #[test]
    fn test_from_stored_rejects_garbage() {
        assert!(CacheKey::from_stored("notes").is_none());
        assert!(CacheKey::from_stored("ia_1234").is_none());
        assert!(CacheKey::from_stored(&format!("_{}", "a".repeat(64))).is_none());
    }

    #[test]
    fn test_stripe_in_range() {
        for i in 0..100 {
            let key = CacheKey::derive("ia", &json!({ "product": format!("p{}", i) }));
            assert!(key.stripe(16) < 16);
        }
        let key = CacheKey::derive("ia", &json!({}));
        assert_eq!(key.stripe(1), 0);
    }
}
