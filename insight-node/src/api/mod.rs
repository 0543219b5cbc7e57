//! # HTTP API
//!
//! 批处理与缓存管理接口：
//!
//! - `GET  /health`
//! - `POST /api/batch/similar`
//! - `POST /api/batch/market`
//! - `GET  /api/cache/stats`
//! - `POST /api/cache/sweep`

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use insight_core::batch::BatchResult;
use insight_core::cache::CacheStats;
use insight_core::InsightError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info};

use crate::AppContext;

/// 相似产品批处理请求
#[derive(Debug, Deserialize)]
pub struct SimilarBatchRequest {
    #[serde(default)]
    pub requests: Vec<String>,
    pub max_workers: Option<usize>,
    pub use_cache: Option<bool>,
}

/// 市场分析批处理请求
#[derive(Debug, Deserialize)]
pub struct MarketBatchRequest {
    #[serde(default)]
    pub requests: Vec<String>,
    #[serde(default)]
    pub prices: Vec<f64>,
    pub max_workers: Option<usize>,
    pub use_cache: Option<bool>,
}

/// 缓存统计响应
#[derive(Debug, Serialize)]
pub struct CacheStatsResponse {
    #[serde(flatten)]
    pub stats: CacheStats,
    pub size_human: String,
}

impl From<CacheStats> for CacheStatsResponse {
    fn from(stats: CacheStats) -> Self {
        let size_human = stats.human_size();
        Self { stats, size_human }
    }
}

/// 接口错误
///
/// 非法请求返回 400，其他错误返回 500。
#[derive(Debug)]
pub struct ApiError(InsightError);

impl From<InsightError> for ApiError {
    fn from(err: InsightError) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(InsightError::invalid_request(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            error!("Request failed: {}", self.0);
            StatusCode::INTERNAL_SERVER_ERROR
        };
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

/// 创建 Axum 路由
pub fn create_router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        // 批处理
        .route("/api/batch/similar", post(batch_similar))
        .route("/api/batch/market", post(batch_market))
        // 缓存管理
        .route("/api/cache/stats", get(cache_stats))
        .route("/api/cache/sweep", post(cache_sweep))
        .with_state(ctx)
}

/// 启动 HTTP 服务，收到 Ctrl-C 后优雅退出
pub async fn serve(ctx: Arc<AppContext>, addr: SocketAddr) -> anyhow::Result<()> {
    let app = create_router(ctx);

    info!("Insight API server starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Insight API server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
}

/// 健康检查
async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn batch_similar(
    State(ctx): State<Arc<AppContext>>,
    payload: Result<Json<SimilarBatchRequest>, JsonRejection>,
) -> Result<Json<BatchResult>, ApiError> {
    let Json(req) = payload?;
    let options = ctx.options(req.max_workers, req.use_cache);
    let result = ctx
        .executor
        .run(&req.requests, ctx.similar.clone(), options)
        .await?;
    Ok(Json(result))
}

async fn batch_market(
    State(ctx): State<Arc<AppContext>>,
    payload: Result<Json<MarketBatchRequest>, JsonRejection>,
) -> Result<Json<BatchResult>, ApiError> {
    let Json(req) = payload?;
    let options = ctx.options(req.max_workers, req.use_cache);
    let result = ctx
        .executor
        .run_priced(&req.requests, &req.prices, ctx.market.clone(), options)
        .await?;
    Ok(Json(result))
}

async fn cache_stats(State(ctx): State<Arc<AppContext>>) -> Json<CacheStatsResponse> {
    Json(ctx.store.stats().await.into())
}

async fn cache_sweep(State(ctx): State<Arc<AppContext>>) -> Json<Value> {
    let removed = ctx.store.sweep_expired().await;
    Json(json!({ "removed": removed }))
}
