//! 平台适配器
//!
//! 每个外部消息平台实现一次 [`Platform`]：负责从通用信封中取出用户标识、正文、历史，
//! 并把回复包装回协议格式。[`PlatformRegistry`] 维护 名称 -> 实现 的映射，
//! 目前只接入 Telex 一个平台。

mod telex;

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::a2a::{ChatResponse, MessageResult, Metadata, Part, RequestEnvelope, ResponseEnvelope};

pub use telex::{TelexPlatform, AGENT_NAME};

/// 适配器层错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    #[error("user_id is required in metadata")]
    MissingUserId,

    #[error("method not supported: {0}")]
    UnsupportedMethod(String),

    #[error("unknown platform: {0}")]
    UnknownPlatform(String),
}

/// 平台适配器 trait
pub trait Platform: Send + Sync {
    /// 平台名称（注册表键）
    fn name(&self) -> &str;

    /// 按固定顺序扫描元数据键，第一个非空字符串即为用户标识
    fn extract_user_id(&self, metadata: &Metadata) -> Result<String, PlatformError>;

    /// 频道标识；缺失不算错误，返回空串
    fn extract_channel_id(&self, metadata: &Metadata) -> String;

    /// 取出本次消息正文（最后一个非空文本胜出）
    fn extract_message(&self, parts: &[Part]) -> String;

    /// 从嵌套 data 片段中还原之前的对话
    fn extract_history(&self, parts: &[Part], current_message_id: &str) -> Vec<MessageResult>;

    /// 校验请求方法
    fn validate_request(&self, req: &RequestEnvelope) -> Result<(), PlatformError>;

    /// 构造回复信封：history 之后追加一条新的 agent 消息
    fn build_response(
        &self,
        request_id: &str,
        message_id: &str,
        history: &[MessageResult],
        response: &ChatResponse,
    ) -> ResponseEnvelope;
}

/// 平台注册表
#[derive(Default, Clone)]
pub struct PlatformRegistry {
    platforms: HashMap<String, Arc<dyn Platform>>,
}

impl PlatformRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预置所有内建平台
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(TelexPlatform::new()));
        registry
    }

    /// 注册平台；同名覆盖
    pub fn register(&mut self, platform: Arc<dyn Platform>) {
        self.platforms.insert(platform.name().to_string(), platform);
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Platform>, PlatformError> {
        self.platforms
            .get(name)
            .cloned()
            .ok_or_else(|| PlatformError::UnknownPlatform(name.to_string()))
    }

    /// 已注册平台名（排序后）
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.platforms.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.platforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.platforms.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_defaults() {
        let registry = PlatformRegistry::with_defaults();
        assert_eq!(registry.names(), vec!["telex".to_string()]);
        assert_eq!(registry.get("telex").unwrap().name(), "telex");
        assert_eq!(
            registry.get("slack").err(),
            Some(PlatformError::UnknownPlatform("slack".into()))
        );
    }

    #[test]
    fn test_registry_register_overrides_same_name() {
        let mut registry = PlatformRegistry::new();
        assert!(registry.is_empty());
        registry.register(Arc::new(TelexPlatform::named("custom")));
        registry.register(Arc::new(TelexPlatform::named("custom")));
        assert_eq!(registry.len(), 1);
    }
}
