//! OpenAI 兼容 API 客户端
//!
//! 通过 async_openai 调用任意 OpenAI 兼容端点（可配置 base_url）；系统提示单独作为 system 消息，
//! 历史与当前消息拼成一条 user 消息。

use std::time::Duration;

use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;

use super::{compose_prompt, GenerativeProvider, LlmError};
use crate::config::LlmSettings;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

pub struct OpenAiCompatibleClient {
    client: Client<OpenAIConfig>,
    model: String,
    temperature: f32,
    timeout: Duration,
}

impl OpenAiCompatibleClient {
    pub fn new(settings: &LlmSettings) -> Self {
        let api_key = settings
            .api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .unwrap_or_default();

        let config = match settings.base_url.as_deref() {
            Some(url) => OpenAIConfig::new().with_api_base(url).with_api_key(api_key),
            None => OpenAIConfig::new().with_api_key(api_key),
        };

        Self {
            client: Client::with_config(config),
            model: settings
                .model
                .clone()
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            temperature: settings.temperature,
            timeout: Duration::from_secs(settings.timeout_secs),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_messages(
        system_prompt: &str,
        user_message: &str,
        history: &[String],
    ) -> Result<Vec<ChatCompletionRequestMessage>, LlmError> {
        // system 已单独发送，user 内容中不再重复
        let user_content = compose_prompt("", user_message, history);
        let user_content = user_content.trim_start().to_string();

        let system = ChatCompletionRequestSystemMessageArgs::default()
            .content(system_prompt.to_string())
            .build()
            .map_err(|e| LlmError::Config(e.to_string()))?;
        let user = ChatCompletionRequestUserMessageArgs::default()
            .content(user_content)
            .build()
            .map_err(|e| LlmError::Config(e.to_string()))?;

        Ok(vec![
            ChatCompletionRequestMessage::System(system),
            ChatCompletionRequestMessage::User(user),
        ])
    }
}

#[async_trait]
impl GenerativeProvider for OpenAiCompatibleClient {
    async fn generate(
        &self,
        system_prompt: &str,
        user_message: &str,
        history: &[String],
    ) -> Result<String, LlmError> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .temperature(self.temperature)
            .messages(Self::build_messages(system_prompt, user_message, history)?)
            .build()
            .map_err(|e| LlmError::Config(e.to_string()))?;

        let response = tokio::time::timeout(self.timeout, self.client.chat().create(request))
            .await
            .map_err(|_| LlmError::Timeout)?
            .map_err(|e| LlmError::Api(e.to_string()))?;

        response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| LlmError::EmptyResponse("no choices with content".to_string()))
    }

    fn name(&self) -> &str {
        "openai"
    }
}
