//! 对话编排：持久化入站消息、识别意图、汇总上下文、生成回复
//!
//! 同一请求内的所有协作调用共享一个截止时间。尽力而为的步骤另有各自的时限
//! （`best_effort_timeout_secs`，且不超过请求截止时间），超时或失败只记日志，
//! 卡住的副作用不会耗尽生成回复的预算；取用户与生成回复是硬性步骤，失败即整体失败，
//! 不做兜底回复。

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use super::{ConversationMessage, MessageRole};
use crate::a2a::ChatResponse;
use crate::checkin::{CheckInService, TREND_NEW};
use crate::config::ConversationSettings;
use crate::error::{ServiceError, ServiceResult};
use crate::intent::{Intent, IntentRecognizer};
use crate::llm::GenerativeProvider;
use crate::reflection::ReflectionService;
use crate::store::Stores;

pub const NEW_USER_CONTEXT: &str = "New user - no previous history";

const PERSONA_PROMPT: &str = "You are Eunoia, a warm and empathetic companion supporting mental wellbeing.

Your approach:
- Listen with genuine curiosity and without judgment
- Acknowledge emotions as valid, whatever they are
- Gently explore what's beneath the surface
- Notice patterns while honoring the present moment
- Celebrate progress, no matter how small
- Validate struggle without offering quick fixes

When responding:
- Speak naturally, as a caring friend would
- Ask thoughtful follow-up questions when appropriate
- Reflect back what you hear to show understanding
- Offer perspective when helpful, never prescribe
- Keep responses concise (under 120 words)
- If detecting crisis language, warmly encourage professional support

Remember: You're here to support, not to solve. Sometimes the most helpful thing is simply being present.
";

/// 人设提示词；有上下文时追加 "Context about this person:" 段
pub fn build_system_prompt(user_context: &str) -> String {
    let mut prompt = PERSONA_PROMPT.to_string();
    if !user_context.is_empty() {
        prompt.push_str("\nContext about this person:\n");
        prompt.push_str(user_context);
        prompt.push_str(
            "\n\nUse this context wisely to personalize your support, but focus on their current message.",
        );
    }
    prompt
}

/// 保留最新的 max 条（输入按时间正序），渲染为 "User: ..." / "Assistant: ..."
pub fn window_history(messages: &[ConversationMessage], max: usize) -> Vec<String> {
    let start = messages.len().saturating_sub(max);
    messages[start..]
        .iter()
        .map(|m| format!("{}: {}", m.role.prompt_label(), m.content))
        .collect()
}

/// 尽力而为：失败或超过 limit 返回 None 并记 warn
async fn best_effort<T, E, F>(limit: Instant, what: &'static str, fut: F) -> Option<T>
where
    E: std::fmt::Display,
    F: Future<Output = Result<T, E>>,
{
    match tokio::time::timeout_at(limit, fut).await {
        Ok(Ok(value)) => Some(value),
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "failed while {}", what);
            None
        }
        Err(_) => {
            tracing::warn!("timed out while {}", what);
            None
        }
    }
}

/// 硬性步骤：超时映射为 ServiceError::Timeout
async fn required<T, E, F>(deadline: Instant, what: &'static str, fut: F) -> ServiceResult<T>
where
    ServiceError: From<E>,
    F: Future<Output = Result<T, E>>,
{
    match tokio::time::timeout_at(deadline, fut).await {
        Ok(result) => result.map_err(ServiceError::from),
        Err(_) => Err(ServiceError::Timeout(what)),
    }
}

/// 对话编排器
#[derive(Clone)]
pub struct ConversationService {
    stores: Stores,
    provider: Arc<dyn GenerativeProvider>,
    check_ins: CheckInService,
    reflections: ReflectionService,
    recognizer: IntentRecognizer,
    settings: ConversationSettings,
}

impl ConversationService {
    pub fn new(
        stores: Stores,
        provider: Arc<dyn GenerativeProvider>,
        settings: ConversationSettings,
    ) -> Self {
        let check_ins = CheckInService::new(stores.users.clone(), stores.check_ins.clone());
        let reflections = ReflectionService::new(
            stores.users.clone(),
            stores.reflections.clone(),
            provider.clone(),
        );
        Self {
            stores,
            provider,
            check_ins,
            reflections,
            recognizer: IntentRecognizer::new(),
            settings,
        }
    }

    pub fn check_ins(&self) -> &CheckInService {
        &self.check_ins
    }

    pub fn reflections(&self) -> &ReflectionService {
        &self.reflections
    }

    fn deadline(&self) -> Instant {
        Instant::now() + Duration::from_secs(self.settings.request_timeout_secs)
    }

    /// 单个尽力而为步骤的时限：自身预算与请求截止时间取较早者
    fn step_limit(&self, deadline: Instant) -> Instant {
        let own = Instant::now() + Duration::from_secs(self.settings.best_effort_timeout_secs);
        own.min(deadline)
    }

    /// 处理一条用户消息并返回回复
    #[tracing::instrument(skip(self, message), fields(len = message.len()))]
    pub async fn process_message(
        &self,
        platform_user_id: &str,
        message: &str,
        message_id: &str,
    ) -> ServiceResult<ChatResponse> {
        if message.trim().is_empty() {
            return Err(ServiceError::EmptyMessage);
        }

        let deadline = self.deadline();

        let user = required(
            deadline,
            "loading user",
            self.stores.users.get_or_create(platform_user_id),
        )
        .await
        .inspect_err(|e| tracing::error!(error = %e, "failed to get or create user"))?;

        let inbound = ConversationMessage::new(&user.id, MessageRole::User, message)
            .with_message_id(message_id);
        best_effort(
            self.step_limit(deadline),
            "saving user message",
            self.stores.messages.save(&inbound),
        )
        .await;

        self.handle_intents(platform_user_id, message, deadline).await;

        let user_context = self.build_user_context(&user.id, deadline).await;

        let recent = best_effort(
            self.step_limit(deadline),
            "loading conversation history",
            self.stores
                .messages
                .list_recent(&user.id, self.settings.history_window_minutes),
        )
        .await
        .unwrap_or_default();
        let history = window_history(&recent, self.settings.max_prompt_history);

        let system_prompt = build_system_prompt(&user_context);

        let reply = required(
            deadline,
            "generating reply",
            self.provider.generate(&system_prompt, message, &history),
        )
        .await
        .inspect_err(|e| tracing::error!(error = %e, "failed to generate response"))?;

        let outbound = ConversationMessage::new(&user.id, MessageRole::Assistant, reply.clone())
            .with_message_id(message_id)
            .with_context(user_context);
        best_effort(
            self.step_limit(deadline),
            "saving assistant message",
            self.stores.messages.save(&outbound),
        )
        .await;

        Ok(ChatResponse {
            response: reply,
            message_id: message_id.to_string(),
        })
    }

    /// 识别到的意图转成打卡 / 反思；任何失败都不影响回复
    async fn handle_intents(&self, platform_user_id: &str, message: &str, deadline: Instant) {
        for intent in self.recognizer.recognize(message) {
            match intent {
                Intent::CheckIn { score, label } => {
                    let created = best_effort(
                        self.step_limit(deadline),
                        "auto-creating check-in",
                        self.check_ins
                            .create_check_in(platform_user_id, score, label, message),
                    )
                    .await;
                    if created.is_some() {
                        tracing::info!(mood = label, "auto-created check-in from conversation");
                    }
                }
                Intent::Reflection => {
                    let created = best_effort(
                        self.step_limit(deadline),
                        "auto-creating reflection",
                        self.reflections.create_reflection(platform_user_id, message),
                    )
                    .await;
                    if created.is_some() {
                        tracing::info!("auto-created reflection from conversation");
                    }
                }
            }
        }
    }

    /// 汇总近期打卡、反思与统计；三个来源并发加载，各自尽力而为
    async fn build_user_context(&self, user_id: &str, deadline: Instant) -> String {
        let mut lines = Vec::new();

        let limit = self.step_limit(deadline);
        let (check_ins, reflections, stats) = tokio::join!(
            best_effort(
                limit,
                "loading recent check-ins",
                self.stores
                    .check_ins
                    .list_by_user(user_id, self.settings.checkin_context_limit),
            ),
            best_effort(
                limit,
                "loading recent reflections",
                self.stores
                    .reflections
                    .list_by_user(user_id, self.settings.reflection_context_limit),
            ),
            best_effort(
                limit,
                "loading check-in stats",
                self.stores.check_ins.stats(user_id, self.settings.stats_days),
            ),
        );

        let check_ins = check_ins.unwrap_or_default();
        if let Some(latest) = check_ins.first() {
            lines.push(format!("Recent check-ins: {} entries", check_ins.len()));
            lines.push(format!(
                "Latest mood: {}/10 ({})",
                latest.mood_score, latest.mood_label
            ));
        }

        let reflections = reflections.unwrap_or_default();
        if let Some(latest) = reflections.first() {
            lines.push(format!("Recent reflections: {} entries", reflections.len()));
            if !latest.sentiment.is_empty() {
                lines.push(format!("Latest sentiment: {}", latest.sentiment));
            }
        }

        if let Some(stats) = stats.filter(|s| s.total_check_ins > 0) {
            lines.push(format!(
                "{}-day mood average: {:.1}/10",
                self.settings.stats_days, stats.average_mood_score
            ));
            if !stats.mood_trend.is_empty() && stats.mood_trend != TREND_NEW {
                lines.push(format!("Mood trend: {}", stats.mood_trend));
            }
        }

        if lines.is_empty() {
            NEW_USER_CONTEXT.to_string()
        } else {
            lines.join("\n")
        }
    }

    /// 最新的 limit 条对话，按时间正序返回；用户不存在是错误
    pub async fn get_conversation_history(
        &self,
        platform_user_id: &str,
        limit: usize,
    ) -> ServiceResult<Vec<ConversationMessage>> {
        let user = self
            .stores
            .users
            .get_by_platform_id(platform_user_id)
            .await
            .map_err(|e| ServiceError::from_user_lookup(e, platform_user_id))?;

        let mut messages = self.stores.messages.list_by_user(&user.id, limit).await?;
        messages.reverse();
        Ok(messages)
    }
}
