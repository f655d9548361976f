use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::{
    AppState,
    cache::CacheEntry,
    error::AppError,
    resolver::scan::sanitize_url,
    sweep::PopulateOutcome,
    utils::{ApiResponse, error_codes, error_to_api_response, success_to_api_response},
};

use super::model::{
    ClearResponse, GetValueResponse, KeyQuery, RegisterBatchRequest, RegisterBatchResponse,
    RegisterRequest, RegisterResponse, ResolveRequest, ResolveResponse,
};

type ApiResult<T> = Result<Json<ApiResponse<T>>, AppError>;

fn require_key(raw: &str) -> Result<String, AppError> {
    let key = raw.trim();
    if key.is_empty() {
        return Err(AppError::Validation("key 不能为空".into()));
    }
    Ok(key.to_string())
}

#[axum::debug_handler]
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<RegisterResponse> {
    let key = require_key(&req.key)?;
    let expires_at = state.cache.register(&key).await?;
    Ok(success_to_api_response(RegisterResponse { key, expires_at }))
}

#[axum::debug_handler]
pub async fn register_batch(
    State(state): State<AppState>,
    Json(req): Json<RegisterBatchRequest>,
) -> ApiResult<RegisterBatchResponse> {
    let keys = state.cache.register_batch(&req.keys).await?;
    if keys.is_empty() {
        return Err(AppError::Validation("没有有效的 key".into()));
    }

    tracing::info!("Registered {} cache keys", keys.len());
    Ok(success_to_api_response(RegisterBatchResponse {
        registered: keys.len(),
        keys,
    }))
}

#[axum::debug_handler]
pub async fn get_value(
    State(state): State<AppState>,
    Query(query): Query<KeyQuery>,
) -> ApiResult<GetValueResponse> {
    let key = require_key(&query.key)?;
    let value = state.cache.get(&key).await?;
    Ok(success_to_api_response(GetValueResponse { key, value }))
}

#[axum::debug_handler]
pub async fn list_entries(State(state): State<AppState>) -> ApiResult<Vec<CacheEntry>> {
    let entries = state.cache.list_entries().await?;
    Ok(success_to_api_response(entries))
}

/// 立即解析一个链接，有结果就写入缓存
#[axum::debug_handler]
pub async fn resolve(
    State(state): State<AppState>,
    Json(req): Json<ResolveRequest>,
) -> ApiResult<ResolveResponse> {
    let url = sanitize_url(&req.url);
    if url.is_empty() {
        return Err(AppError::Validation("url 不能为空".into()));
    }

    let detail = state
        .resolver
        .resolve_detailed(&url, state.config.head_limit, &state.config.member_marker)
        .await;

    let value = detail.destination_for(&url);
    if let Some(value) = &value {
        state.cache.register(&url).await?;
        state.cache.set(&url, value).await?;
    }

    Ok(success_to_api_response(ResolveResponse { url, value, detail }))
}

#[axum::debug_handler]
pub async fn populate(State(state): State<AppState>) -> ApiResult<PopulateOutcome> {
    let outcome = state.populator.populate().await?;
    Ok(success_to_api_response(outcome))
}

#[axum::debug_handler]
pub async fn sweep_status(State(state): State<AppState>) -> Response {
    match state.populator.status().await {
        Some(status) => (StatusCode::OK, success_to_api_response(status)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            error_to_api_response::<()>(error_codes::NOT_FOUND, "还没有运行过填充任务".into()),
        )
            .into_response(),
    }
}

#[axum::debug_handler]
pub async fn cancel_sweep(State(state): State<AppState>) -> Json<ApiResponse<serde_json::Value>> {
    let cancelled = state.populator.cancel().await;
    success_to_api_response(serde_json::json!({ "cancelled": cancelled }))
}

#[axum::debug_handler]
pub async fn clear_values(State(state): State<AppState>) -> ApiResult<ClearResponse> {
    let affected = state.cache.clear_values_only().await?;
    Ok(success_to_api_response(ClearResponse { affected }))
}

#[axum::debug_handler]
pub async fn clear_all(State(state): State<AppState>) -> ApiResult<ClearResponse> {
    let affected = state.cache.clear_all().await?;
    Ok(success_to_api_response(ClearResponse { affected }))
}
