use crate::api::FUNCTION_KEY_HEADER;
use crate::models::QuestionRequest;

/// 网关 HTTP 客户端; 所有结果 (包括失败) 都以文本返回给对话
pub struct GatewayClient {
    client: reqwest::Client,
    url: String,
    function_key: Option<String>,
}

impl GatewayClient {
    pub fn new(url: impl Into<String>, function_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            function_key,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn ask(&self, question: &str) -> String {
        let mut request = self.client.post(&self.url).json(&QuestionRequest::new(question));
        if let Some(key) = &self.function_key {
            request = request.header(FUNCTION_KEY_HEADER, key);
        }

        let resp = match request.send().await {
            Ok(resp) => resp,
            Err(e) => {
                tracing::error!("请求网关失败 {}: {}", self.url, e);
                return format!("Erro: {}", e);
            }
        };

        let status = resp.status();
        let body = match resp.text().await {
            Ok(body) => body,
            Err(e) => return format!("Erro: {}", e),
        };

        if status.is_success() {
            body
        } else {
            format!("Erro {}: {}", status.as_u16(), body)
        }
    }
}
