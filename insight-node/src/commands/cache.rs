//! # Cache Commands
//!
//! - `insight stats` - 查看缓存统计
//! - `insight sweep` - 清理过期和损坏的条目

use anyhow::Result;
use serde_json::json;

use crate::api::CacheStatsResponse;
use crate::AppContext;

/// Show cache statistics
pub async fn show_stats(ctx: &AppContext, json_output: bool) -> Result<()> {
    let stats = ctx.store.stats().await;

    if json_output {
        let response = CacheStatsResponse::from(stats);
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    println!("Cache backend: {}", ctx.store.backend_name());
    if ctx.store.backend_name() == "file" {
        println!("Cache dir:     {}", ctx.config.cache.dir.display());
    }
    println!();
    println!("Entries:     {}", stats.total_entries);
    println!("  Valid:     {}", stats.valid_entries);
    println!("  Expired:   {}", stats.expired_entries);
    if stats.unreadable_entries() > 0 {
        println!("  Unreadable: {}", stats.unreadable_entries());
    }
    println!("Size:        {}", stats.human_size());

    if !stats.count_by_category.is_empty() {
        println!();
        println!("By category:");
        for (category, count) in &stats.count_by_category {
            println!("  {:<20} {}", category, count);
        }
    }

    Ok(())
}

/// Remove expired and corrupt entries
pub async fn sweep(ctx: &AppContext, json_output: bool) -> Result<()> {
    let removed = ctx.store.sweep_expired().await;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&json!({ "removed": removed }))?);
    } else {
        println!("✓ Removed {} entries", removed);
    }
    Ok(())
}
