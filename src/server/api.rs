//! HTTP API for the block metadata cache.
//!
//! - PUT  /v1/blocks/{block_id}
//! - GET  /v1/blocks/{block_id}
//! - POST /v1/access
//! - GET  /v1/cache/stats
//! - GET  /v1/cache/dump
//! - GET  /metrics
//! - GET  /health

use std::sync::{Arc, Mutex};
use std::time::Instant;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::cache::{AccessResult, BlockId, EvictionPolicy, Lookup, SharedCache};
use crate::error::CacheError;
use crate::stats::{CacheStats, PrometheusSink};

/// Application state shared across handlers.
pub struct AppState {
    pub cache: SharedCache,
    pub metrics: Mutex<PrometheusSink>,
    pub start_time: Instant,
}

/// Build the axum router with all API routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/blocks/{block_id}", get(get_block).put(put_block))
        .route("/v1/access", post(access))
        .route("/v1/cache/stats", get(cache_stats))
        .route("/v1/cache/dump", get(cache_dump))
        .route("/metrics", get(metrics))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ─── Request/Response Types ────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct PutBlockRequest {
    pub size: u64,
    #[serde(default)]
    pub etag: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PutBlockResponse {
    pub evicted: Vec<BlockId>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BlockInfo {
    pub block_id: BlockId,
    pub size: u64,
    pub etag: String,
}

/// Generic access request; `op` is "GET" or "PUT".
#[derive(Debug, Deserialize)]
pub struct AccessRequest {
    pub op: String,
    pub block_id: BlockId,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub etag: String,
}

#[derive(Debug, Serialize)]
#[serde(tag = "result", rename_all = "lowercase")]
pub enum AccessResponse {
    Disabled,
    Get(Lookup),
    Put { evicted: Vec<BlockId> },
}

impl From<AccessResult> for AccessResponse {
    fn from(result: AccessResult) -> Self {
        match result {
            AccessResult::Disabled => AccessResponse::Disabled,
            AccessResult::Get(lookup) => AccessResponse::Get(lookup),
            AccessResult::Put(evicted) => AccessResponse::Put { evicted },
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
    pub enabled: bool,
    pub policy: EvictionPolicy,
    pub utilization: f64,
    pub cache: CacheStats,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ─── Errors ────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ApiError {
    Cache(CacheError),
    Internal(String),
}

impl From<CacheError> for ApiError {
    fn from(err: CacheError) -> Self {
        ApiError::Cache(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Cache(err) if err.is_caller_error() => (StatusCode::BAD_REQUEST, err.to_string()),
            ApiError::Cache(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        if status.is_server_error() {
            error!(error = %message, "Request failed");
        }
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

// ─── Route Handlers ────────────────────────────────────────────────────────

async fn put_block(
    State(state): State<Arc<AppState>>,
    Path(block_id): Path<BlockId>,
    Json(req): Json<PutBlockRequest>,
) -> Result<Json<PutBlockResponse>, ApiError> {
    let request_id = Uuid::new_v4().to_string();
    let evicted = state.cache.put(&block_id, req.size, &req.etag)?;

    info!(
        request_id = request_id,
        block_id = block_id,
        size = req.size,
        evicted = evicted.len(),
        "PUT block"
    );

    Ok(Json(PutBlockResponse { evicted }))
}

async fn get_block(
    State(state): State<Arc<AppState>>,
    Path(block_id): Path<BlockId>,
) -> Result<Response, ApiError> {
    let request_id = Uuid::new_v4().to_string();
    let lookup = state.cache.get(&block_id)?;

    debug!(
        request_id = request_id,
        block_id = block_id,
        hit = lookup.is_hit(),
        "GET block"
    );

    if !lookup.is_hit() {
        return Ok(StatusCode::NOT_FOUND.into_response());
    }
    Ok(Json(BlockInfo {
        block_id,
        size: lookup.size,
        etag: lookup.etag,
    })
    .into_response())
}

async fn access(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AccessRequest>,
) -> Result<Json<AccessResponse>, ApiError> {
    let request_id = Uuid::new_v4().to_string();

    info!(
        request_id = request_id,
        op = req.op,
        block_id = req.block_id,
        "Cache access request"
    );

    let result = state
        .cache
        .access_named(&req.op, &req.block_id, req.size, &req.etag)?;
    Ok(Json(result.into()))
}

async fn cache_stats(State(state): State<Arc<AppState>>) -> Result<Json<CacheStats>, ApiError> {
    let request_id = Uuid::new_v4().to_string();
    debug!(request_id = request_id, "Cache stats request");
    Ok(Json(state.cache.stats()?))
}

async fn cache_dump(State(state): State<Arc<AppState>>) -> Result<String, ApiError> {
    let request_id = Uuid::new_v4().to_string();
    debug!(request_id = request_id, "Cache dump request");
    Ok(state.cache.dump()?.to_string())
}

async fn metrics(State(state): State<Arc<AppState>>) -> Result<String, ApiError> {
    let request_id = Uuid::new_v4().to_string();
    debug!(request_id = request_id, "Metrics scrape");

    let mut sink = state
        .metrics
        .lock()
        .map_err(|_| ApiError::Internal("metrics lock poisoned".to_string()))?;
    state.cache.write_statistics(&mut *sink)?;
    sink.encode().map_err(|e| ApiError::Internal(e.to_string()))
}

async fn health(State(state): State<Arc<AppState>>) -> Result<Json<HealthResponse>, ApiError> {
    let request_id = Uuid::new_v4().to_string();
    debug!(request_id = request_id, "Health check");

    let cache = state.cache.stats()?;
    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        enabled: state.cache.is_enabled(),
        policy: state.cache.policy(),
        utilization: cache.usage_fraction(),
        cache,
    }))
}
