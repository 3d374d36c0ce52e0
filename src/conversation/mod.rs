//! 对话：消息模型、编排服务与 A2A 处理器

pub mod handler;
mod model;
mod service;

pub use handler::{handle_a2a, health, AppState};
pub use model::{ConversationMessage, MessageRole};
pub use service::{build_system_prompt, window_history, ConversationService, NEW_USER_CONTEXT};
