use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use chat_fiscal::config::AppConfig;
use chat_fiscal::models::{Column, Dataset};
use chat_fiscal::service::{OpenAiTableAgent, TabularAgent};
use chat_fiscal::FiscalError;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

#[derive(Clone, Copy)]
enum Mode {
    /// 第一轮请求工具, 第二轮给出答案
    ToolThenAnswer,
    /// 永远请求工具
    AlwaysTool,
    /// 无工具调用, content 为 null
    NullContent,
    Unavailable,
}

#[derive(Clone)]
struct MockState {
    mode: Mode,
    requests: Arc<Mutex<Vec<Value>>>,
}

fn tool_call_reply() -> Value {
    json!({
        "choices": [{
            "message": {
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": "call_1",
                    "type": "function",
                    "function": {
                        "name": "consultar_tabela",
                        "arguments": "{\"group_by\":[\"item_description\"],\"aggregate\":{\"op\":\"sum\",\"column\":\"quantity\"}}"
                    }
                }]
            }
        }]
    })
}

async fn completions(State(state): State<MockState>, Json(body): Json<Value>) -> Response {
    let round = {
        let mut requests = state.requests.lock().unwrap();
        requests.push(body);
        requests.len()
    };
    match state.mode {
        Mode::Unavailable => (StatusCode::SERVICE_UNAVAILABLE, "sobrecarregado").into_response(),
        Mode::AlwaysTool => Json(tool_call_reply()).into_response(),
        Mode::NullContent => Json(json!({
            "choices": [{
                "message": {"role": "assistant", "content": null},
                "finish_reason": "length"
            }]
        }))
        .into_response(),
        Mode::ToolThenAnswer if round == 1 => Json(tool_call_reply()).into_response(),
        Mode::ToolThenAnswer => Json(json!({
            "choices": [{
                "message": {"role": "assistant", "content": "Resposta final: cement=13, sand=5"}
            }]
        }))
        .into_response(),
    }
}

async fn spawn_mock(mode: Mode) -> (String, Arc<Mutex<Vec<Value>>>) {
    let requests = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new()
        .route("/v1/chat/completions", post(completions))
        .with_state(MockState {
            mode,
            requests: requests.clone(),
        });
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), requests)
}

fn agent(endpoint: String, max_iterations: usize) -> OpenAiTableAgent {
    let mut cfg = AppConfig::default().agent;
    cfg.endpoint = endpoint;
    cfg.api_key = Some("sk-test".to_string());
    cfg.max_iterations = max_iterations;
    cfg.timeout_secs = Some(10);
    OpenAiTableAgent::new(cfg).unwrap()
}

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

#[tokio::test]
async fn tool_result_is_fed_back_and_answer_returned() {
    let (endpoint, requests) = spawn_mock(Mode::ToolThenAnswer).await;
    let answer = agent(endpoint, 15)
        .run("instrução", &table(), "quanto de cada item?")
        .await
        .unwrap();
    assert_eq!(answer, "Resposta final: cement=13, sand=5");

    let requests = requests.lock().unwrap();
    assert_eq!(requests.len(), 2);
    let first = &requests[0];
    assert_eq!(first["model"], "gpt-3.5-turbo");
    assert_eq!(first["max_tokens"], 400);
    assert_eq!(first["tools"][0]["function"]["name"], "consultar_tabela");
    assert!(first["messages"][0]["content"]
        .as_str()
        .unwrap()
        .starts_with("instrução"));

    let messages = requests[1]["messages"].as_array().unwrap();
    let tool = messages.last().unwrap();
    assert_eq!(tool["role"], "tool");
    assert_eq!(tool["tool_call_id"], "call_1");
    let result: Value = serde_json::from_str(tool["content"].as_str().unwrap()).unwrap();
    assert_eq!(result["rows"], json!([["cement", "13"], ["sand", "5"]]));
}

#[tokio::test]
async fn iteration_limit_is_upstream_error() {
    let (endpoint, requests) = spawn_mock(Mode::AlwaysTool).await;
    let err = agent(endpoint, 3)
        .run("instrução", &table(), "loop")
        .await
        .unwrap_err();
    assert!(matches!(err, FiscalError::UpstreamAgentError(_)));
    assert_eq!(requests.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn non_success_status_is_upstream_error() {
    let (endpoint, _) = spawn_mock(Mode::Unavailable).await;
    let err = agent(endpoint, 15)
        .run("instrução", &table(), "oi")
        .await
        .unwrap_err();
    match err {
        FiscalError::UpstreamAgentError(msg) => assert!(msg.contains("sobrecarregado")),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn missing_final_content_is_upstream_error() {
    let (endpoint, requests) = spawn_mock(Mode::NullContent).await;
    let err = agent(endpoint, 15)
        .run("instrução", &table(), "oi")
        .await
        .unwrap_err();
    assert!(matches!(err, FiscalError::UpstreamAgentError(_)));
    assert_eq!(requests.lock().unwrap().len(), 1);
}
