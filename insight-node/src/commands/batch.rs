//! # Batch Commands
//!
//! - `insight batch <products...>` - 相似产品批处理
//! - `insight market <products...> --price ...` - 市场分析批处理

use anyhow::Result;
use insight_core::batch::BatchResult;
use serde_json::Value;

use crate::AppContext;

/// Run a similar-products batch and print the result
pub async fn run_similar(
    ctx: &AppContext,
    products: &[String],
    max_workers: Option<usize>,
    no_cache: bool,
    json: bool,
) -> Result<()> {
    let options = ctx.options(max_workers, Some(!no_cache));
    let result = ctx.executor.run(products, ctx.similar.clone(), options).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    for (product, value) in &result.results_by_request {
        let similar: Vec<&str> = value
            .as_array()
            .map(|items| items.iter().skip(1).filter_map(Value::as_str).collect())
            .unwrap_or_default();
        println!("{}", product);
        for name in similar {
            println!("  - {}", name);
        }
    }
    print_stats(&result);
    Ok(())
}

/// Run a priced market-analysis batch and print the result
pub async fn run_market(
    ctx: &AppContext,
    products: &[String],
    prices: &[f64],
    max_workers: Option<usize>,
    no_cache: bool,
    json: bool,
) -> Result<()> {
    let options = ctx.options(max_workers, Some(!no_cache));
    let result = ctx
        .executor
        .run_priced(products, prices, ctx.market.clone(), options)
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    for (product, analysis) in &result.results_by_request {
        println!("{}", product);
        if let Some(items) = analysis["produtos_similares"].as_array() {
            for item in items {
                println!(
                    "  {:<32} {:>10}  {:>6}%",
                    item["nome"].as_str().unwrap_or("-"),
                    item["preco"].as_f64().map(|p| format!("{:.2}", p)).unwrap_or_default(),
                    item["tendencia"].as_f64().map(|t| format!("{:+.1}", t)).unwrap_or_default(),
                );
            }
        }
        if let Some(events) = analysis["eventos"].as_array() {
            for event in events.iter().filter_map(Value::as_str) {
                println!("  * {}", event);
            }
        }
    }
    print_stats(&result);
    Ok(())
}

fn print_stats(result: &BatchResult) {
    let stats = &result.stats;
    println!();
    println!(
        "Total: {}  Hits: {}  Misses: {}  Deduplicated: {}  Fallbacks: {}",
        stats.total, stats.hits, stats.misses, stats.deduplicated, stats.fallbacks
    );
}
