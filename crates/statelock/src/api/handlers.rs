use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::api::AppState;
use crate::api::error::ApiError;
use crate::error::StateLockError;
use crate::memory::types::{
    HybridMemoryQuery, MemoryQuery, MemoryRecord, MemoryUpsert, NewMemory, Page, RankedMemory,
    RestoreItem, RestoreMode, SessionSnapshot, SessionSummary, StatsOverview, TagSummary,
};

type ApiResult<T> = std::result::Result<T, ApiError>;

fn body<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    payload
        .map(|Json(value)| value)
        .map_err(|e| ApiError(StateLockError::Validation(e.body_text())))
}

fn params<T>(query: std::result::Result<Query<T>, QueryRejection>) -> ApiResult<T> {
    query
        .map(|Query(value)| value)
        .map_err(|e| ApiError(StateLockError::Validation(e.body_text())))
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            message: message.into(),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub results: Vec<RankedMemory>,
}

pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "store": state.engine.store().name(),
        "embedder": state.engine.embedder().name(),
    }))
}

pub async fn add_memory(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<NewMemory>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<MemoryRecord>)> {
    let memory = body(payload)?;
    state.limits.check_new(&memory)?;
    let record = state.engine.add(memory).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn upsert_memory(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<MemoryUpsert>, JsonRejection>,
) -> ApiResult<Json<MemoryRecord>> {
    let upsert = body(payload)?;
    state.limits.check_upsert(&upsert)?;
    Ok(Json(state.engine.upsert(upsert).await?))
}

pub async fn get_memory(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<MemoryRecord>> {
    Ok(Json(state.engine.get(&id).await?))
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub session_id: Option<String>,
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: usize,
}

pub async fn list_memories(
    State(state): State<Arc<AppState>>,
    query: std::result::Result<Query<ListParams>, QueryRejection>,
) -> ApiResult<Json<Page<MemoryRecord>>> {
    let params = params(query)?;
    let limit = params.limit.unwrap_or(state.server.default_page_size);
    state.limits.check_page(limit, state.server.max_page_size)?;

    let page = state
        .engine
        .page(params.session_id.as_deref(), limit, params.offset)
        .await?;
    Ok(Json(page))
}

pub async fn query_memories(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<MemoryQuery>, JsonRejection>,
) -> ApiResult<Json<QueryResponse>> {
    let query = body(payload)?;
    state.limits.check_query(&query)?;
    let results = state.engine.query(&query).await?;
    Ok(Json(QueryResponse { results }))
}

pub async fn hybrid_query_memories(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<HybridMemoryQuery>, JsonRejection>,
) -> ApiResult<Json<QueryResponse>> {
    let query = body(payload)?;
    state.limits.check_hybrid(&query)?;
    let results = state.engine.hybrid_query(&query).await?;
    Ok(Json(QueryResponse { results }))
}

pub async fn delete_memory(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    state.engine.delete_one(&id).await?;
    Ok(MessageResponse::new(format!("Deleted block {id}.")))
}

#[derive(Debug, Deserialize)]
pub struct BulkDeleteRequest {
    pub ids: Vec<String>,
}

pub async fn delete_bulk(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<BulkDeleteRequest>, JsonRejection>,
) -> ApiResult<Json<MessageResponse>> {
    let request = body(payload)?;
    state.engine.delete_many(&request.ids).await?;
    Ok(MessageResponse::new(format!(
        "Deleted {} blocks.",
        request.ids.len()
    )))
}

pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    state.limits.check_session(&session_id)?;
    state.engine.delete_session(&session_id).await?;
    Ok(MessageResponse::new(format!(
        "Deleted all blocks for session {session_id}."
    )))
}

#[derive(Debug, Deserialize)]
pub struct SnapshotParams {
    #[serde(default = "default_snapshot_limit")]
    pub limit: usize,
}

fn default_snapshot_limit() -> usize {
    1000
}

pub async fn snapshot_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    query: std::result::Result<Query<SnapshotParams>, QueryRejection>,
) -> ApiResult<Json<SessionSnapshot>> {
    let params = params(query)?;
    state.limits.check_session(&session_id)?;
    state.limits.check_snapshot_limit(params.limit)?;
    Ok(Json(state.engine.snapshot(&session_id, params.limit).await?))
}

#[derive(Debug, Deserialize)]
pub struct RestoreRequest {
    #[serde(default)]
    pub mode: RestoreMode,
    #[serde(default)]
    pub memories: Vec<RestoreItem>,
}

#[derive(Debug, Serialize)]
pub struct RestoreResponse {
    pub session_id: String,
    pub mode: RestoreMode,
    pub restored: usize,
}

pub async fn restore_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    payload: std::result::Result<Json<RestoreRequest>, JsonRejection>,
) -> ApiResult<Json<RestoreResponse>> {
    let request = body(payload)?;
    state.limits.check_session(&session_id)?;
    for item in &request.memories {
        state.limits.check_restore_item(item)?;
    }

    let restored = state
        .engine
        .restore(&session_id, request.mode, request.memories)
        .await?;

    Ok(Json(RestoreResponse {
        session_id,
        mode: request.mode,
        restored,
    }))
}

#[derive(Debug, Deserialize)]
pub struct PageParams {
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: usize,
}

pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
    query: std::result::Result<Query<PageParams>, QueryRejection>,
) -> ApiResult<Json<Page<SessionSummary>>> {
    let params = params(query)?;
    let limit = params.limit.unwrap_or(50);
    state.limits.check_page(limit, state.server.max_page_size)?;
    Ok(Json(state.engine.list_sessions(limit, params.offset).await?))
}

pub async fn list_tags(
    State(state): State<Arc<AppState>>,
    query: std::result::Result<Query<PageParams>, QueryRejection>,
) -> ApiResult<Json<Page<TagSummary>>> {
    let params = params(query)?;
    let limit = params.limit.unwrap_or(20);
    state.limits.check_page(limit, state.server.max_page_size)?;
    Ok(Json(state.engine.list_tags(limit, params.offset).await?))
}

#[derive(Debug, Deserialize)]
pub struct StatsParams {
    #[serde(default = "default_top_tags_limit")]
    pub top_tags_limit: usize,
}

fn default_top_tags_limit() -> usize {
    5
}

const MAX_TOP_TAGS: usize = 20;

pub async fn stats_overview(
    State(state): State<Arc<AppState>>,
    query: std::result::Result<Query<StatsParams>, QueryRejection>,
) -> ApiResult<Json<StatsOverview>> {
    let params = params(query)?;
    state.limits.check_page(params.top_tags_limit, MAX_TOP_TAGS)?;
    Ok(Json(state.engine.stats_overview(params.top_tags_limit).await?))
}
