use crate::error::FiscalError;
use crate::models::QuestionRequest;
use crate::service::QuestionGateway;
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

/// 共享状态: 网关 + 可选的函数密钥
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<QuestionGateway>,
    pub function_key: Option<String>,
}

/// 健康检查
pub async fn health_check() -> &'static str {
    "OK"
}

/// 问答接口: 200 纯文本回答, 400 缺少 pergunta, 500 固定模板
pub async fn fiscal_llm_endpoint(State(state): State<AppState>, body: Bytes) -> Response {
    // 非 JSON 或缺字段一律按 400 处理
    let question = serde_json::from_slice::<QuestionRequest>(&body)
        .ok()
        .and_then(|req| req.question().map(str::to_string));

    let Some(question) = question else {
        tracing::warn!("请求缺少 pergunta ({} bytes)", body.len());
        return FiscalError::BadRequest.into_response();
    };

    match state.gateway.answer(&question).await {
        Ok(answer) => (StatusCode::OK, answer).into_response(),
        Err(e) => e.into_response(),
    }
}

impl IntoResponse for FiscalError {
    fn into_response(self) -> Response {
        match self {
            FiscalError::BadRequest => (StatusCode::BAD_REQUEST, self.to_string()).into_response(),
            other => {
                tracing::error!("请求处理失败: {}", other);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Erro ao processar a requisição: {}", other),
                )
                    .into_response()
            }
        }
    }
}
