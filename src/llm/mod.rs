//! 生成式内容层：Provider 抽象与实现（Gemini / OpenAI 兼容 / Mock）
//!
//! 所有后端实现 GenerativeProvider::generate；情感分析与主题提取是建立在 generate 之上的默认方法。

pub mod gemini;
pub mod mock;
pub mod openai;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::LlmSettings;

pub use gemini::GeminiClient;
pub use mock::MockProvider;
pub use openai::OpenAiCompatibleClient;

/// 生成失败
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("provider returned error: {0}")]
    Api(String),

    #[error("empty response: {0}")]
    EmptyResponse(String),

    #[error("generation timed out")]
    Timeout,

    #[error("provider misconfigured: {0}")]
    Config(String),
}

/// 生成式内容 Provider
#[async_trait]
pub trait GenerativeProvider: Send + Sync {
    /// 根据系统提示、当前消息和已渲染好的历史行生成回复
    async fn generate(
        &self,
        system_prompt: &str,
        user_message: &str,
        history: &[String],
    ) -> Result<String, LlmError>;

    /// 单词情感标签：positive / negative / neutral / mixed（小写、去空白）
    async fn analyze_sentiment(&self, text: &str) -> Result<String, LlmError> {
        let prompt = format!(
            "Analyze the sentiment of the following text and respond with only one word: \
             \"positive\", \"negative\", \"neutral\", or \"mixed\".\n\nText: {text}\n\nSentiment:"
        );
        let sentiment = self
            .generate("You are a sentiment analysis assistant.", &prompt, &[])
            .await?;
        Ok(sentiment.trim().to_lowercase())
    }

    /// 3-5 个关键主题，逗号分隔
    async fn extract_themes(&self, text: &str) -> Result<String, LlmError> {
        let prompt = format!(
            "Extract 3-5 key themes or topics from the following text. \
             Return them as a comma-separated list.\n\nText: {text}\n\nKey themes:"
        );
        let themes = self
            .generate("You are a text analysis assistant.", &prompt, &[])
            .await?;
        Ok(themes.trim().to_string())
    }

    fn name(&self) -> &str;
}

/// 拼装单段提示词：系统提示 + 历史（若有）+ 当前消息
///
/// 历史行已带 "User: " / "Assistant: " 前缀，原样写入。
pub fn compose_prompt(system_prompt: &str, user_message: &str, history: &[String]) -> String {
    let mut prompt = String::with_capacity(
        system_prompt.len() + user_message.len() + history.iter().map(|h| h.len() + 1).sum::<usize>() + 64,
    );
    prompt.push_str(system_prompt);
    prompt.push_str("\n\n");

    if !history.is_empty() {
        prompt.push_str("Previous conversation:\n");
        for line in history {
            prompt.push_str(line);
            prompt.push('\n');
        }
        prompt.push('\n');
    }

    prompt.push_str("Current message:\n");
    prompt.push_str(user_message);
    prompt
}

/// 按配置创建 Provider：gemini / openai / mock
pub fn create_provider(settings: &LlmSettings) -> Result<Arc<dyn GenerativeProvider>, LlmError> {
    match settings.provider.to_lowercase().as_str() {
        "gemini" => {
            let api_key = settings
                .api_key
                .clone()
                .or_else(|| std::env::var("GEMINI_API_KEY").ok())
                .filter(|k| !k.trim().is_empty())
                .ok_or_else(|| LlmError::Config("gemini api key is empty".to_string()))?;
            let client = GeminiClient::new(api_key, settings)?;
            tracing::info!(model = %client.model(), "gemini provider initialized");
            Ok(Arc::new(client))
        }
        "openai" => {
            let client = OpenAiCompatibleClient::new(settings);
            tracing::info!(model = %client.model(), "openai-compatible provider initialized");
            Ok(Arc::new(client))
        }
        "mock" => {
            tracing::warn!("using mock provider, replies are echoes");
            Ok(Arc::new(MockProvider::new()))
        }
        other => Err(LlmError::Config(format!("unknown llm provider: {other}"))),
    }
}
