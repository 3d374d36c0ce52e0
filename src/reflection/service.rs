//! 反思服务：情感、主题与简短回应均由 Provider 生成，任一失败都用兜底值继续

use std::sync::Arc;

use super::Reflection;
use crate::error::{ServiceError, ServiceResult};
use crate::llm::GenerativeProvider;
use crate::store::{ReflectionStore, UserStore};

pub const SENTIMENT_FALLBACK: &str = "unknown";
pub const ANALYSIS_FALLBACK: &str = "Analysis unavailable at this time.";

const ANALYSIS_SYSTEM_PROMPT: &str = "You are a thoughtful companion helping someone process their inner experience.

Respond with warmth and insight:
- Acknowledge what stands out in their reflection
- Notice patterns or connections they might not see
- Validate the complexity of their feelings
- Offer a gentle perspective or question for further reflection
- Keep it brief (under 80 words) and genuine";

#[derive(Clone)]
pub struct ReflectionService {
    users: Arc<dyn UserStore>,
    reflections: Arc<dyn ReflectionStore>,
    provider: Arc<dyn GenerativeProvider>,
}

impl ReflectionService {
    pub fn new(
        users: Arc<dyn UserStore>,
        reflections: Arc<dyn ReflectionStore>,
        provider: Arc<dyn GenerativeProvider>,
    ) -> Self {
        Self {
            users,
            reflections,
            provider,
        }
    }

    #[tracing::instrument(skip(self, content))]
    pub async fn create_reflection(
        &self,
        platform_user_id: &str,
        content: &str,
    ) -> ServiceResult<Reflection> {
        if content.trim().is_empty() {
            return Err(ServiceError::EmptyReflection);
        }

        let user = self.users.get_or_create(platform_user_id).await?;

        let sentiment = self.provider.analyze_sentiment(content).await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "failed to analyze sentiment");
            SENTIMENT_FALLBACK.to_string()
        });

        let themes = self.provider.extract_themes(content).await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "failed to extract key themes");
            String::new()
        });

        let analysis = self
            .provider
            .generate(
                ANALYSIS_SYSTEM_PROMPT,
                &analysis_prompt(content, &sentiment, &themes),
                &[],
            )
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "failed to generate reflection analysis");
                ANALYSIS_FALLBACK.to_string()
            });

        let mut reflection = Reflection::new(&user.id, content);
        reflection.sentiment = sentiment.trim().to_string();
        reflection.key_themes = themes.trim().to_string();
        reflection.ai_analysis = analysis;

        self.reflections.create(&reflection).await?;
        tracing::info!(reflection_id = %reflection.id, "reflection created");
        Ok(reflection)
    }

    pub async fn history(
        &self,
        platform_user_id: &str,
        limit: usize,
    ) -> ServiceResult<Vec<Reflection>> {
        let user = self
            .users
            .get_by_platform_id(platform_user_id)
            .await
            .map_err(|e| ServiceError::from_user_lookup(e, platform_user_id))?;
        Ok(self.reflections.list_by_user(&user.id, limit).await?)
    }
}

fn analysis_prompt(content: &str, sentiment: &str, themes: &str) -> String {
    format!(
        "They reflected: \"{content}\"\n\n\
         The emotional tone seems {sentiment}, touching on: {themes}\n\n\
         Offer a brief, supportive response that honors their experience:"
    )
}
