use axum::{
    Router,
    routing::{get, post},
};

use crate::{AppState, middleware::require_admin, routes};

// 缓存公开路由
fn cache_routes() -> Router<AppState> {
    Router::new()
        .route("/cache/register", post(routes::cache::register))
        .route("/cache/register-batch", post(routes::cache::register_batch))
        .route("/cache/get", get(routes::cache::get_value))
        .route("/cache/list", get(routes::cache::list_entries))
        .route("/cache/resolve", post(routes::cache::resolve))
        .route("/cache/populate", post(routes::cache::populate))
        .route("/cache/sweep", get(routes::cache::sweep_status))
}

// 维护路由，需要管理员
fn maintenance_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/cache/sweep/cancel", post(routes::cache::cancel_sweep))
        .route("/cache/clear-values", post(routes::cache::clear_values))
        .route("/cache/clear-all", post(routes::cache::clear_all))
        .route_layer(axum::middleware::from_fn_with_state(state, require_admin))
}

/// 创建带状态的主路由，挂在配置的前缀下
pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/health", get(|| async { "ok" }))
        .merge(cache_routes())
        .merge(maintenance_routes(state.clone()));

    let base = state.config.api_base_uri.trim_end_matches('/').to_string();
    let router = if base.is_empty() {
        api
    } else {
        Router::new().nest(&base, api)
    };

    router
        .layer(axum::middleware::from_fn(crate::middleware::log_errors))
        .with_state(state)
}
