use serde::{Deserialize, Serialize};

/// 请求体: {"pergunta": "..."}
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuestionRequest {
    #[serde(default)]
    pub pergunta: Option<String>,
}

impl QuestionRequest {
    pub fn new(pergunta: impl Into<String>) -> Self {
        Self {
            pergunta: Some(pergunta.into()),
        }
    }

    /// 去掉首尾空白后的问题; 缺失或为空时返回 None
    pub fn question(&self) -> Option<&str> {
        self.pergunta
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
    }
}
