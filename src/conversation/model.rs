//! 持久化的对话消息（只追加，不修改、不删除）

use chrono::{DateTime, Utc};

/// 消息角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(MessageRole::User),
            "assistant" => Some(MessageRole::Assistant),
            _ => None,
        }
    }

    /// 提示词历史中的角色标签
    pub fn prompt_label(&self) -> &'static str {
        match self {
            MessageRole::User => "User",
            MessageRole::Assistant => "Assistant",
        }
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConversationMessage {
    pub id: String,
    pub user_id: String,
    pub role: MessageRole,
    pub content: String,
    /// 入站请求的 messageId（关联用）
    pub message_id: Option<String>,
    /// 生成回复时使用的上下文摘要快照
    pub context_data: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ConversationMessage {
    pub fn new(user_id: &str, role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            role,
            content: content.into(),
            message_id: None,
            context_data: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_message_id(mut self, message_id: &str) -> Self {
        if !message_id.is_empty() {
            self.message_id = Some(message_id.to_string());
        }
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context_data = Some(context.into());
        self
    }
}
