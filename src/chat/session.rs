use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Bot,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEntry {
    pub role: Role,
    pub content: String,
}

/// 对话记录: 只追加, 不修改也不删除, 不持久化
#[derive(Debug, Default)]
pub struct ChatSession {
    entries: Vec<ChatEntry>,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.push(Role::User, content.into());
    }

    pub fn push_bot(&mut self, content: impl Into<String>) {
        self.push(Role::Bot, content.into());
    }

    pub fn entries(&self) -> &[ChatEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 一问一答: 先记录用户输入, 再记录 ask 返回的文本
    pub async fn exchange<F, Fut>(&mut self, input: &str, ask: F) -> &ChatEntry
    where
        F: FnOnce(String) -> Fut,
        Fut: std::future::Future<Output = String>,
    {
        self.push_user(input);
        let reply = ask(input.to_string()).await;
        self.push(Role::Bot, reply)
    }

    fn push(&mut self, role: Role, content: String) -> &ChatEntry {
        self.entries.push(ChatEntry { role, content });
        &self.entries[self.entries.len() - 1]
    }
}
