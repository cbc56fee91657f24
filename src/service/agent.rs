//! 表格推理 Agent
//!
//! 基于 OpenAI 兼容的 `/v1/chat/completions` 工具调用:
//! 模型生成 `TableQuery` (工具 `consultar_tabela`), 本地对合并表执行后把结果
//! 作为 tool 消息回传, 直到模型给出最终文本或达到迭代上限。

use crate::config::AgentConfig;
use crate::error::{FiscalError, Result};
use crate::models::Dataset;
use crate::service::query::{self, TableQuery};
use async_trait::async_trait;
use reqwest::header;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

pub const QUERY_TOOL_NAME: &str = "consultar_tabela";
const PREVIEW_ROWS: usize = 5;
const SNIPPET_LEN: usize = 300;

/// 表格问答 Agent (外部协作者)
#[async_trait]
pub trait TabularAgent: Send + Sync {
    /// 返回最终文本, 原样透传
    async fn run(&self, system: &str, table: &Dataset, question: &str) -> Result<String>;
}

pub struct OpenAiTableAgent {
    client: reqwest::Client,
    cfg: AgentConfig,
    url_chat: String,
}

impl OpenAiTableAgent {
    pub fn new(cfg: AgentConfig) -> Result<Self> {
        let api_key = cfg
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| FiscalError::UpstreamAgentError("chave da API não configurada".to_string()))?;

        let endpoint = cfg.endpoint.trim();
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(FiscalError::UpstreamAgentError(format!(
                "endpoint inválido: {}",
                cfg.endpoint
            )));
        }

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&format!("Bearer {}", api_key))
                .map_err(|e| FiscalError::UpstreamAgentError(format!("chave inválida: {}", e)))?,
        );

        let mut builder = reqwest::Client::builder().default_headers(headers);
        if let Some(secs) = cfg.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| FiscalError::UpstreamAgentError(e.to_string()))?;

        let url_chat = format!("{}/v1/chat/completions", endpoint.trim_end_matches('/'));
        tracing::info!(model = %cfg.model, endpoint = %cfg.endpoint, "OpenAiTableAgent initialized");

        Ok(Self {
            client,
            cfg,
            url_chat,
        })
    }

    async fn complete(&self, messages: &[ChatMessage], tools: &[ToolSpec]) -> Result<ChatMessage> {
        let body = ChatCompletionRequest {
            model: &self.cfg.model,
            messages,
            tools,
            temperature: self.cfg.temperature,
            max_tokens: self.cfg.max_tokens,
        };

        let resp = self
            .client
            .post(&self.url_chat)
            .json(&body)
            .send()
            .await
            .map_err(|e| FiscalError::UpstreamAgentError(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let snippet: String = text.chars().take(SNIPPET_LEN).collect();
            tracing::error!(%status, url = %self.url_chat, %snippet, "chat completion returned non-success status");
            return Err(FiscalError::UpstreamAgentError(format!(
                "HTTP {}: {}",
                status, snippet
            )));
        }

        let out: ChatCompletionResponse = resp.json().await.map_err(|e| {
            FiscalError::UpstreamAgentError(format!("resposta inesperada do modelo: {}", e))
        })?;
        out.choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| FiscalError::UpstreamAgentError("resposta sem choices".to_string()))
    }
}

#[async_trait]
impl TabularAgent for OpenAiTableAgent {
    async fn run(&self, system: &str, table: &Dataset, question: &str) -> Result<String> {
        let started = Instant::now();
        let tools = [query_tool()];
        let mut messages = vec![
            ChatMessage::text("system", format!("{}\n\n{}", system, describe_table(table))),
            ChatMessage::text("user", question.to_string()),
        ];

        for iteration in 1..=self.cfg.max_iterations {
            let reply = self.complete(&messages, &tools).await?;
            let calls = reply.tool_calls.clone().unwrap_or_default();

            if calls.is_empty() {
                // 没有工具调用也没有文本 (例如被 max_tokens 截断) 视为上游失败
                let answer = reply
                    .content
                    .filter(|c| !c.trim().is_empty())
                    .ok_or_else(|| {
                        tracing::error!("agent 第 {} 轮返回空内容", iteration);
                        FiscalError::UpstreamAgentError(
                            "o modelo não retornou uma resposta".to_string(),
                        )
                    })?;
                tracing::info!(
                    "agent 完成: {} 轮, 耗时: {:?}",
                    iteration,
                    started.elapsed()
                );
                return Ok(answer);
            }

            messages.push(reply);
            for call in calls {
                let output = run_tool(table, &call);
                tracing::debug!("tool {} -> {} bytes", call.function.name, output.len());
                messages.push(ChatMessage::tool_result(call.id, output));
            }
        }

        tracing::warn!("agent 达到迭代上限 {}", self.cfg.max_iterations);
        Err(FiscalError::UpstreamAgentError(format!(
            "o agente não concluiu em {} iterações",
            self.cfg.max_iterations
        )))
    }
}

/// 执行一次工具调用; 错误以文本形式回给模型
pub fn run_tool(table: &Dataset, call: &ToolCall) -> String {
    if call.function.name != QUERY_TOOL_NAME {
        return format!("Erro: ferramenta desconhecida '{}'", call.function.name);
    }
    let parsed: std::result::Result<TableQuery, _> = serde_json::from_str(&call.function.arguments);
    match parsed {
        Ok(q) => match query::execute(table, &q) {
            Ok(result) => result.to_json(),
            Err(e) => format!("Erro: {}", e),
        },
        Err(e) => format!("Erro: argumentos inválidos: {}", e),
    }
}

fn describe_table(table: &Dataset) -> String {
    format!(
        "O DataFrame possui {} linhas. Primeiras linhas (CSV):\n{}",
        table.row_count(),
        table.preview(PREVIEW_ROWS)
    )
}

fn query_tool() -> ToolSpec {
    ToolSpec {
        kind: "function",
        function: FunctionSpec {
            name: QUERY_TOOL_NAME,
            description: "Executa uma consulta sobre o DataFrame de notas fiscais. \
Ordem: filters, distinct_by, group_by/aggregate (ou select), order_by, limit.",
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "filters": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "column": {"type": "string"},
                                "op": {"type": "string", "enum": ["eq", "ne", "contains", "gt", "gte", "lt", "lte"]},
                                "value": {"type": ["string", "number"]}
                            },
                            "required": ["column", "op", "value"]
                        }
                    },
                    "distinct_by": {"type": "string", "description": "Coluna para deduplicar (ex.: access_key)."},
                    "group_by": {"type": "array", "items": {"type": "string"}},
                    "aggregate": {
                        "type": "object",
                        "properties": {
                            "op": {"type": "string", "enum": ["count", "count_distinct", "sum", "mean", "min", "max"]},
                            "column": {"type": "string"}
                        },
                        "required": ["op"]
                    },
                    "select": {"type": "array", "items": {"type": "string"}},
                    "order_by": {
                        "type": "object",
                        "properties": {
                            "column": {"type": "string"},
                            "descending": {"type": "boolean"}
                        },
                        "required": ["column"]
                    },
                    "limit": {"type": "integer", "minimum": 1, "maximum": query::MAX_LIMIT}
                }
            }),
        },
    }
}

/* ===========================================================================
HTTP payloads
======================================================================== */

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    tools: &'a [ToolSpec],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    fn text(role: &str, content: String) -> Self {
        Self {
            role: role.to_string(),
            content: Some(content),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    fn tool_result(call_id: String, content: String) -> Self {
        Self {
            role: "tool".to_string(),
            content: Some(content),
            tool_calls: None,
            tool_call_id: Some(call_id),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type", default = "function_kind")]
    pub kind: String,
    pub function: FunctionCall,
}

fn function_kind() -> String {
    "function".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: String,
}

#[derive(Debug, Serialize)]
struct ToolSpec {
    #[serde(rename = "type")]
    kind: &'static str,
    function: FunctionSpec,
}

#[derive(Debug, Serialize)]
struct FunctionSpec {
    name: &'static str,
    description: &'static str,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::models::Column;

    fn table() -> Dataset {
        let cells = |values: &[&str]| -> Vec<Option<String>> {
            values.iter().map(|v| Some(v.to_string())).collect()
        };
        Dataset::from_columns(vec![
            (Column::AccessKey, cells(&["AA", "AA", "BB"])),
            (Column::ItemDescription, cells(&["cement", "sand", "cement"])),
            (Column::Quantity, cells(&["10", "5", "3"])),
        ])
        .unwrap()
    }

    fn call(name: &str, arguments: &str) -> ToolCall {
        ToolCall {
            id: "call_1".to_string(),
            kind: "function".to_string(),
            function: FunctionCall {
                name: name.to_string(),
                arguments: arguments.to_string(),
            },
        }
    }

    #[test]
    fn tool_executes_query() {
        let output = run_tool(
            &table(),
            &call(
                QUERY_TOOL_NAME,
                r#"{"group_by":["item_description"],"aggregate":{"op":"sum","column":"quantity"}}"#,
            ),
        );
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["rows"], serde_json::json!([["cement", "13"], ["sand", "5"]]));
    }

    #[test]
    fn tool_errors_are_text() {
        assert!(run_tool(&table(), &call("python", "{}")).starts_with("Erro"));
        assert!(run_tool(&table(), &call(QUERY_TOOL_NAME, "not json")).starts_with("Erro"));
        assert!(run_tool(&table(), &call(QUERY_TOOL_NAME, r#"{"select":["x"]}"#))
            .contains("coluna desconhecida"));
    }

    #[test]
    fn new_requires_api_key() {
        let cfg = AppConfig::default().agent;
        assert!(matches!(
            OpenAiTableAgent::new(cfg),
            Err(FiscalError::UpstreamAgentError(_))
        ));
    }

    #[test]
    fn assistant_tool_calls_round_trip() {
        let raw = r#"{"role":"assistant","content":null,"tool_calls":[{"id":"c1","type":"function","function":{"name":"consultar_tabela","arguments":"{}"}}]}"#;
        let msg: ChatMessage = serde_json::from_str(raw).unwrap();
        let back = serde_json::to_value(&msg).unwrap();
        assert_eq!(back["tool_calls"][0]["type"], "function");
        assert!(back.get("tool_call_id").is_none());
    }
}
