//! A2A（agent-to-agent）协议：信封、消息片段、任务结果与保留错误码

mod error;
mod types;

pub use error::{ErrorCode, RpcError};
pub use types::{
    Artifact, ChatResponse, Configuration, Message, MessageResult, Metadata, Params, Part,
    PushNotificationConfig, RequestEnvelope, ResponseEnvelope, TaskResult, TaskStatus,
    JSONRPC_VERSION, METHOD_SEND,
};
