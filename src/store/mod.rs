//! 存储抽象层
//!
//! 定义编排层依赖的持久化接口，支持内存和 SQLite（`async-sqlite` feature）两种实现。
//! 所有实现都必须保证 platform_user_id 唯一：get_or_create 在并发首次接触时不会产生重复用户。

#[cfg(test)]
mod flaky;
mod memory;
#[cfg(feature = "async-sqlite")]
mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::checkin::{CheckIn, CheckInStats};
use crate::conversation::ConversationMessage;
use crate::reflection::Reflection;
use crate::user::User;

#[cfg(test)]
pub(crate) use flaky::{Failures, FlakyStore};
pub use memory::MemoryStore;
#[cfg(feature = "async-sqlite")]
pub use sqlite::SqliteStore;

/// 存储错误
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

#[cfg(feature = "async-sqlite")]
impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Backend(e.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// 用户存储
#[async_trait]
pub trait UserStore: Send + Sync {
    /// 读取，未命中时创建
    async fn get_or_create(&self, platform_user_id: &str) -> StoreResult<User>;

    /// 未找到返回 [`StoreError::NotFound`]
    async fn get_by_platform_id(&self, platform_user_id: &str) -> StoreResult<User>;

    async fn update_username(&self, user_id: &str, username: &str) -> StoreResult<()>;
}

/// 对话消息存储
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn save(&self, message: &ConversationMessage) -> StoreResult<()>;

    /// 最近 window_minutes 分钟内的消息，按时间正序
    async fn list_recent(
        &self,
        user_id: &str,
        window_minutes: i64,
    ) -> StoreResult<Vec<ConversationMessage>>;

    /// 最新的 limit 条消息，按时间倒序
    async fn list_by_user(&self, user_id: &str, limit: usize)
        -> StoreResult<Vec<ConversationMessage>>;
}

/// 情绪打卡存储
#[async_trait]
pub trait CheckInStore: Send + Sync {
    async fn create(&self, check_in: &CheckIn) -> StoreResult<()>;

    /// 按打卡时间倒序
    async fn list_by_user(&self, user_id: &str, limit: usize) -> StoreResult<Vec<CheckIn>>;

    /// 最近 days 天的均分与条数；趋势取最新两条打卡比较
    async fn stats(&self, user_id: &str, days: i64) -> StoreResult<CheckInStats>;

    /// 今天（UTC）的最新一条打卡
    async fn today(&self, user_id: &str) -> StoreResult<Option<CheckIn>>;
}

/// 反思存储
#[async_trait]
pub trait ReflectionStore: Send + Sync {
    async fn create(&self, reflection: &Reflection) -> StoreResult<()>;

    /// 按创建时间倒序
    async fn list_by_user(&self, user_id: &str, limit: usize) -> StoreResult<Vec<Reflection>>;

    /// 最近 days 天内的反思，按创建时间倒序
    async fn list_recent(&self, user_id: &str, days: i64) -> StoreResult<Vec<Reflection>>;
}

/// 一组共享的存储句柄
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub messages: Arc<dyn MessageStore>,
    pub check_ins: Arc<dyn CheckInStore>,
    pub reflections: Arc<dyn ReflectionStore>,
}

impl Stores {
    /// 四个接口由同一个后端实现
    pub fn from_backend<S>(backend: Arc<S>) -> Self
    where
        S: UserStore + MessageStore + CheckInStore + ReflectionStore + 'static,
    {
        Self {
            users: backend.clone(),
            messages: backend.clone(),
            check_ins: backend.clone(),
            reflections: backend,
        }
    }

    pub fn in_memory() -> Self {
        Self::from_backend(Arc::new(MemoryStore::new()))
    }
}

/// 创建存储
///
/// 提供了 database_url 且启用了 async-sqlite feature 时使用 SQLite；否则使用内存存储
pub async fn create_stores(database_url: Option<&str>) -> Stores {
    #[cfg(feature = "async-sqlite")]
    if let Some(url) = database_url {
        match SqliteStore::connect(url).await {
            Ok(store) => {
                tracing::info!("Using SQLite store: {}", url);
                return Stores::from_backend(Arc::new(store));
            }
            Err(e) => {
                tracing::warn!("Failed to open SQLite store, falling back to memory: {}", e);
            }
        }
    }

    #[cfg(not(feature = "async-sqlite"))]
    if database_url.is_some() {
        tracing::warn!("Database url configured but async-sqlite feature not enabled, using memory store");
    }

    tracing::info!("Using in-memory store");
    Stores::in_memory()
}
