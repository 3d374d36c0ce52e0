//! Mock Provider（用于测试与本地联调，无需 API）
//!
//! 默认回显当前消息；可设置固定回复、失败或延迟，并记录每次调用。

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::{GenerativeProvider, LlmError};

/// 一次 generate 调用的参数快照
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub system_prompt: String,
    pub user_message: String,
    pub history: Vec<String>,
}

#[derive(Debug, Default)]
pub struct MockProvider {
    reply: Option<String>,
    failure: Option<LlmError>,
    delay: Option<Duration>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reply(reply: impl Into<String>) -> Self {
        Self {
            reply: Some(reply.into()),
            ..Self::default()
        }
    }

    pub fn failing(error: LlmError) -> Self {
        Self {
            failure: Some(error),
            ..Self::default()
        }
    }

    /// 每次调用先等待 delay
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl GenerativeProvider for MockProvider {
    async fn generate(
        &self,
        system_prompt: &str,
        user_message: &str,
        history: &[String],
    ) -> Result<String, LlmError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall {
                system_prompt: system_prompt.to_string(),
                user_message: user_message.to_string(),
                history: history.to_vec(),
            });
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(err) = &self.failure {
            return Err(err.clone());
        }

        Ok(self
            .reply
            .clone()
            .unwrap_or_else(|| format!("Echo from Mock: {user_message}")))
    }

    fn name(&self) -> &str {
        "mock"
    }
}
