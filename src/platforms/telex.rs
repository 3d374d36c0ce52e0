//! Telex 平台适配
//!
//! Telex 会把当前可见的整段对话连同新消息一起塞进一次请求（放在 data 片段里），
//! 因此正文取「最后一个非空文本」，历史按片段位置还原。

use std::sync::OnceLock;

use chrono::{SecondsFormat, Utc};
use regex::Regex;

use super::{Platform, PlatformError};
use crate::a2a::{
    ChatResponse, MessageResult, Metadata, Part, RequestEnvelope, ResponseEnvelope, TaskResult,
    TaskStatus, METHOD_SEND,
};

/// 回复消息 metadata.agent 的取值
pub const AGENT_NAME: &str = "eunoia";

const USER_ID_KEYS: [&str; 3] = ["platform_user_id", "telex_user_id", "user_id"];
const CHANNEL_ID_KEYS: [&str; 3] = ["platform_channel_id", "telex_channel_id", "channel_id"];

static PARAGRAPH_TAG_RE: OnceLock<Regex> = OnceLock::new();

/// 去掉 <p> / </p> 包裹标签并去首尾空白
fn strip_markup(s: &str) -> String {
    let re = PARAGRAPH_TAG_RE.get_or_init(|| Regex::new(r"</?p>").expect("static regex"));
    re.replace_all(s, "").trim().to_string()
}

fn first_string(metadata: &Metadata, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        metadata
            .get(*key)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    })
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Telex 适配器
#[derive(Debug, Clone)]
pub struct TelexPlatform {
    name: String,
}

impl TelexPlatform {
    pub fn new() -> Self {
        Self::named("telex")
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for TelexPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl Platform for TelexPlatform {
    fn name(&self) -> &str {
        &self.name
    }

    fn extract_user_id(&self, metadata: &Metadata) -> Result<String, PlatformError> {
        first_string(metadata, &USER_ID_KEYS).ok_or(PlatformError::MissingUserId)
    }

    fn extract_channel_id(&self, metadata: &Metadata) -> String {
        first_string(metadata, &CHANNEL_ID_KEYS).unwrap_or_default()
    }

    fn extract_message(&self, parts: &[Part]) -> String {
        let mut last_text = String::new();

        for part in parts {
            if part.is_text() && !part.text.is_empty() {
                last_text = part.text.clone();
            } else if part.is_data() {
                for nested in &part.data {
                    if !nested.is_text() || nested.text.is_empty() {
                        continue;
                    }
                    let text = strip_markup(&nested.text);
                    if !text.is_empty() {
                        last_text = text;
                    }
                }
            }
        }

        last_text.trim().to_string()
    }

    fn extract_history(&self, parts: &[Part], current_message_id: &str) -> Vec<MessageResult> {
        let mut history = Vec::new();

        for part in parts.iter().filter(|p| p.is_data()) {
            for (i, nested) in part.data.iter().enumerate() {
                if !nested.is_text() || nested.text.is_empty() {
                    continue;
                }
                let text = strip_markup(&nested.text);
                if text.is_empty() {
                    continue;
                }
                // 按位置奇偶推断角色，载荷本身不带角色信息；未经真实数据确认前不要加强这一语义
                let role = if i % 2 == 0 { "user" } else { "agent" };
                history.push(MessageResult::text(role, text, current_message_id, new_id()));
            }
        }

        history
    }

    fn validate_request(&self, req: &RequestEnvelope) -> Result<(), PlatformError> {
        if req.method != METHOD_SEND {
            return Err(PlatformError::UnsupportedMethod(req.method.clone()));
        }
        Ok(())
    }

    fn build_response(
        &self,
        request_id: &str,
        message_id: &str,
        history: &[MessageResult],
        response: &ChatResponse,
    ) -> ResponseEnvelope {
        let task_id = new_id();
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);

        let mut reply = MessageResult::text("agent", response.response.clone(), message_id, task_id.clone());
        reply
            .metadata
            .insert("agent".to_string(), serde_json::Value::String(AGENT_NAME.to_string()));

        let mut updated_history = history.to_vec();
        updated_history.push(reply.clone());

        ResponseEnvelope::success(
            request_id,
            TaskResult {
                id: task_id,
                context_id: new_id(),
                status: TaskStatus {
                    state: "completed".to_string(),
                    timestamp,
                    message: reply,
                },
                artifacts: Vec::new(),
                history: updated_history,
                kind: "task".to_string(),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn metadata(value: serde_json::Value) -> Metadata {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_extract_message_last_text_wins() {
        let p = TelexPlatform::new();
        let parts = vec![Part::text("A"), Part::text("B")];
        assert_eq!(p.extract_message(&parts), "B");
    }

    #[test]
    fn test_extract_message_strips_paragraph_tags() {
        let p = TelexPlatform::new();
        let parts = vec![Part::data(vec![Part::text("<p>hello</p>")])];
        assert_eq!(p.extract_message(&parts), "hello");
    }

    #[test]
    fn test_extract_message_skips_empty_markup() {
        let p = TelexPlatform::new();
        let parts = vec![
            Part::text("first"),
            Part::data(vec![Part::text("<p>second</p>"), Part::text("<p> </p>")]),
        ];
        assert_eq!(p.extract_message(&parts), "second");

        let only_markup = vec![Part::data(vec![Part::text("<p></p>")])];
        assert_eq!(p.extract_message(&only_markup), "");
    }

    #[test]
    fn test_extract_user_id_key_priority() {
        let p = TelexPlatform::new();
        let md = metadata(json!({"user_id": "c", "telex_user_id": "b", "platform_user_id": ""}));
        assert_eq!(p.extract_user_id(&md).unwrap(), "b");

        let md = metadata(json!({"user_id": 42}));
        assert_eq!(p.extract_user_id(&md), Err(PlatformError::MissingUserId));
    }

    #[test]
    fn test_extract_channel_id_miss_is_empty() {
        let p = TelexPlatform::new();
        assert_eq!(p.extract_channel_id(&Metadata::new()), "");
        let md = metadata(json!({"channel_id": "ch-1", "telex_channel_id": "ch-0"}));
        assert_eq!(p.extract_channel_id(&md), "ch-0");
    }

    #[test]
    fn test_extract_history_parity_roles() {
        let p = TelexPlatform::new();
        let parts = vec![
            Part::text("now"),
            Part::data(vec![
                Part::text("<p>hi</p>"),
                Part::text("hello, how are you?"),
                Part::text(""),
                Part::text("<p>ok</p>"),
            ]),
        ];

        let history = p.extract_history(&parts, "m-1");
        let roles: Vec<&str> = history.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["user", "agent", "agent"]);
        assert!(history.iter().all(|m| m.message_id == "m-1" && !m.task_id.is_empty()));
        assert_eq!(history[0].parts, vec![Part::text("hi")]);
    }

    #[test]
    fn test_validate_request_rejects_other_methods() {
        let p = TelexPlatform::new();
        let mut req = RequestEnvelope {
            method: METHOD_SEND.to_string(),
            ..Default::default()
        };
        assert!(p.validate_request(&req).is_ok());
        req.method = "tasks/get".into();
        assert_eq!(
            p.validate_request(&req),
            Err(PlatformError::UnsupportedMethod("tasks/get".into()))
        );
    }

    #[test]
    fn test_build_response_appends_reply() {
        let p = TelexPlatform::new();
        let history = vec![
            MessageResult::text("user", "hi", "m-1", "t-a".into()),
            MessageResult::text("agent", "hello", "m-1", "t-b".into()),
        ];
        let chat = ChatResponse {
            response: "I'm here".into(),
            message_id: "m-1".into(),
        };

        let env = p.build_response("req-1", "m-1", &history, &chat);
        let result = env.result.unwrap();

        assert_eq!(env.id, "req-1");
        assert!(env.error.is_none());
        assert_eq!(result.status.state, "completed");
        assert_eq!(result.kind, "task");
        assert_eq!(result.history.len(), 3);
        assert_eq!(&result.history[..2], &history[..]);
        assert_eq!(result.history[2], result.status.message);
        assert_eq!(result.status.message.role, "agent");
        assert_eq!(result.status.message.message_id, "m-1");
        assert_eq!(result.status.message.task_id, result.id);
        assert_eq!(result.status.message.metadata["agent"], "eunoia");
        assert_ne!(result.id, result.context_id);
        assert!(result.status.timestamp.ends_with('Z'));
    }
}
