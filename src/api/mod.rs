pub mod auth;
pub mod handlers;

pub use auth::{require_function_key, FUNCTION_KEY_HEADER};
pub use handlers::{fiscal_llm_endpoint, health_check, AppState};

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

pub const FISCAL_ENDPOINT: &str = "/api/fiscal_llm_endpoint";

/// 路由: 问答接口需要 function key, 健康检查不需要
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route(FISCAL_ENDPOINT, post(fiscal_llm_endpoint))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_function_key,
        ));

    Router::new()
        .route("/health", get(health_check))
        .merge(protected)
        .with_state(state)
}
