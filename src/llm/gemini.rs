//! Google Gemini REST 客户端
//!
//! 直接调用 generateContent：整段提示词作为单条 user 内容发送，回复取首个候选的所有文本片段拼接。

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{compose_prompt, GenerativeProvider, LlmError};
use crate::config::LlmSettings;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

pub struct GeminiClient {
    api_key: String,
    model: String,
    base_url: String,
    temperature: f32,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(api_key: String, settings: &LlmSettings) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| LlmError::Config(e.to_string()))?;

        Ok(Self {
            api_key,
            model: settings
                .model
                .clone()
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: settings
                .base_url
                .clone()
                .unwrap_or_else(|| API_BASE.to_string()),
            temperature: settings.temperature,
            client,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url.trim_end_matches('/'),
            self.model,
            self.api_key
        )
    }

    fn request_body(&self, prompt: &str) -> Value {
        json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": prompt }]
            }],
            "generationConfig": {
                "temperature": self.temperature
            }
        })
    }
}

/// 从 generateContent 响应中取出首个候选的文本
fn extract_text(body: &Value) -> Result<String, LlmError> {
    let candidate = body["candidates"]
        .as_array()
        .and_then(|c| c.first())
        .ok_or_else(|| {
            LlmError::EmptyResponse(format!(
                "no candidates in response, content may have been blocked ({})",
                body["promptFeedback"]
            ))
        })?;

    let parts = candidate["content"]["parts"]
        .as_array()
        .filter(|p| !p.is_empty())
        .ok_or_else(|| {
            LlmError::EmptyResponse(format!(
                "no content parts, finish reason {}",
                candidate["finishReason"].as_str().unwrap_or("unknown")
            ))
        })?;

    Ok(parts
        .iter()
        .filter_map(|p| p["text"].as_str())
        .collect::<Vec<_>>()
        .concat())
}

fn map_reqwest_error(e: reqwest::Error) -> LlmError {
    if e.is_timeout() {
        LlmError::Timeout
    } else {
        LlmError::Request(e.without_url().to_string())
    }
}

#[async_trait]
impl GenerativeProvider for GeminiClient {
    async fn generate(
        &self,
        system_prompt: &str,
        user_message: &str,
        history: &[String],
    ) -> Result<String, LlmError> {
        let prompt = compose_prompt(system_prompt, user_message, history);

        let response = self
            .client
            .post(self.endpoint())
            .json(&self.request_body(&prompt))
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            tracing::error!(%status, "gemini request rejected");
            return Err(LlmError::Api(format!("{status}: {detail}")));
        }

        let body: Value = response.json().await.map_err(map_reqwest_error)?;
        let text = extract_text(&body).inspect_err(|e| {
            tracing::error!(error = %e, "gemini returned no usable content");
        })?;
        Ok(text)
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> LlmSettings {
        LlmSettings::default()
    }

    #[test]
    fn test_defaults() {
        let client = GeminiClient::new("k".into(), &settings()).unwrap();
        assert_eq!(client.model(), DEFAULT_MODEL);
        assert_eq!(
            client.endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent?key=k"
        );
        let body = client.request_body("hi");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "hi");
        assert!((body["generationConfig"]["temperature"].as_f64().unwrap() - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_extract_text_concatenates_parts() {
        let body = json!({
            "candidates": [{ "content": { "parts": [{ "text": "Hello " }, { "text": "there" }] } }]
        });
        assert_eq!(extract_text(&body).unwrap(), "Hello there");
    }

    #[test]
    fn test_extract_text_blocked() {
        let body = json!({ "candidates": [], "promptFeedback": { "blockReason": "SAFETY" } });
        assert!(matches!(extract_text(&body), Err(LlmError::EmptyResponse(_))));

        let body = json!({ "candidates": [{ "finishReason": "MAX_TOKENS", "content": { "parts": [] } }] });
        match extract_text(&body) {
            Err(LlmError::EmptyResponse(msg)) => assert!(msg.contains("MAX_TOKENS")),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
