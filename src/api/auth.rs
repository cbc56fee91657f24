use crate::api::handlers::AppState;
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};

pub const FUNCTION_KEY_HEADER: &str = "x-functions-key";

/// 配置了 function_key 时校验请求头; 未配置时放行 (由部署平台负责)
pub async fn require_function_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if let Some(expected) = state.function_key.as_deref() {
        let provided = request
            .headers()
            .get(FUNCTION_KEY_HEADER)
            .and_then(|v| v.to_str().ok());
        if provided != Some(expected) {
            tracing::warn!("function key 校验失败: {}", request.uri().path());
            return StatusCode::UNAUTHORIZED.into_response();
        }
    }
    next.run(request).await
}
