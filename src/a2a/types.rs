//! A2A 协议报文定义
//!
//! JSON-RPC 2.0 风格的请求 / 响应信封，字段名与线上协议保持一致（camelCase）。

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::RpcError;

/// 支持的 JSON-RPC 版本
pub const JSONRPC_VERSION: &str = "2.0";

/// 唯一支持的方法
pub const METHOD_SEND: &str = "message/send";

/// 元数据：任意 JSON 对象
pub type Metadata = Map<String, Value>;

/// 入站请求信封
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestEnvelope {
    #[serde(default)]
    pub jsonrpc: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub params: Params,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Params {
    #[serde(default)]
    pub message: Message,
    #[serde(default)]
    pub configuration: Configuration,
}

/// 入站消息
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub parts: Vec<Part>,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub message_id: String,
}

/// 消息片段：text 携带文本；data 携带嵌套片段（部分平台用它捎带之前的对话）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Part {
    #[serde(default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data: Vec<Part>,
}

impl Part {
    pub const TEXT: &'static str = "text";
    pub const DATA: &'static str = "data";

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: Self::TEXT.to_string(),
            text: text.into(),
            data: Vec::new(),
        }
    }

    pub fn data(parts: Vec<Part>) -> Self {
        Self {
            kind: Self::DATA.to_string(),
            text: String::new(),
            data: parts,
        }
    }

    pub fn is_text(&self) -> bool {
        self.kind == Self::TEXT
    }

    pub fn is_data(&self) -> bool {
        self.kind == Self::DATA
    }
}

/// 请求配置（透传，核心逻辑不强制）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Configuration {
    #[serde(default)]
    pub accepted_output_modes: Vec<String>,
    #[serde(default)]
    pub history_length: i64,
    #[serde(default)]
    pub push_notification_config: PushNotificationConfig,
    #[serde(default)]
    pub blocking: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PushNotificationConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub authentication: Metadata,
}

/// 出站消息（历史与新回复共用）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageResult {
    pub kind: String,
    pub role: String,
    pub parts: Vec<Part>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Metadata,
    pub message_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub task_id: String,
}

impl MessageResult {
    pub const KIND: &'static str = "message";

    /// 单文本片段消息
    pub fn text(role: &str, text: impl Into<String>, message_id: &str, task_id: String) -> Self {
        Self {
            kind: Self::KIND.to_string(),
            role: role.to_string(),
            parts: vec![Part::text(text)],
            metadata: Metadata::new(),
            message_id: message_id.to_string(),
            task_id,
        }
    }
}

/// 任务状态
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatus {
    pub state: String,
    pub timestamp: String,
    pub message: MessageResult,
}

/// 产出物（当前恒为空，保留字段以兼容协议）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub artifact_id: String,
    pub name: String,
    pub parts: Vec<Part>,
}

/// 任务结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskResult {
    pub id: String,
    pub context_id: String,
    pub status: TaskStatus,
    pub artifacts: Vec<Artifact>,
    pub history: Vec<MessageResult>,
    pub kind: String,
}

/// 响应信封：result 与 error 二选一
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub jsonrpc: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<TaskResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl ResponseEnvelope {
    pub fn success(id: impl Into<String>, result: TaskResult) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: id.into(),
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: impl Into<String>, error: RpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: id.into(),
            result: None,
            error: Some(error),
        }
    }
}

/// 编排层返回给处理器的回复
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    pub message_id: String,
}
