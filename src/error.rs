//! 业务层错误类型
//!
//! 编排器与打卡/反思服务共用；协议层在 handler 中把它折叠为 InternalError。

use thiserror::Error;

use crate::llm::LlmError;
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("message cannot be empty")]
    EmptyMessage,

    #[error("user not found: {0}")]
    UserNotFound(String),

    #[error("mood score must be between 1 and 10, got {0}")]
    InvalidMoodScore(u8),

    #[error("reflection content cannot be empty")]
    EmptyReflection,

    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("generation failed: {0}")]
    Llm(#[from] LlmError),

    /// 超过单次请求的截止时间
    #[error("timed out while {0}")]
    Timeout(&'static str),
}

impl ServiceError {
    /// 把「用户不存在」从存储错误中区分出来
    pub fn from_user_lookup(err: StoreError, platform_user_id: &str) -> Self {
        match err {
            StoreError::NotFound(_) => ServiceError::UserNotFound(platform_user_id.to_string()),
            other => ServiceError::Store(other),
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
