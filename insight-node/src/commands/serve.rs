//! # Serve Command
//!
//! 启动 HTTP 服务，并按配置启动后台清理任务。

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::{api, AppContext};

/// Run the HTTP server until Ctrl-C
pub async fn serve(ctx: AppContext, bind: Option<String>) -> Result<()> {
    let bind = bind.unwrap_or_else(|| ctx.config.server.bind_address.clone());
    let addr: SocketAddr = bind
        .parse()
        .with_context(|| format!("Invalid bind address: {}", bind))?;

    let ctx = Arc::new(ctx);

    let sweeper = ctx.config.cache.sweep_interval().map(|interval| {
        info!(interval_secs = interval.as_secs(), "Starting cache sweeper");
        ctx.store.clone().start_sweeper(interval)
    });

    let result = api::serve(ctx, addr).await;

    if let Some(handle) = sweeper {
        handle.abort();
    }
    result
}
