//! 测试用存储：包装内存存储，可按操作注入失败

use async_trait::async_trait;

use super::{
    CheckInStore, MemoryStore, MessageStore, ReflectionStore, StoreError, StoreResult, UserStore,
};
use crate::checkin::{CheckIn, CheckInStats};
use crate::conversation::ConversationMessage;
use crate::reflection::Reflection;
use crate::user::User;

/// 置为 true 的操作返回 [`StoreError::Backend`]
#[derive(Debug, Default, Clone, Copy)]
pub struct Failures {
    pub save_message: bool,
    pub recent_messages: bool,
    pub list_check_ins: bool,
    pub check_in_stats: bool,
    pub list_reflections: bool,
}

pub struct FlakyStore {
    inner: MemoryStore,
    failures: Failures,
}

impl FlakyStore {
    pub fn new(failures: Failures) -> Self {
        Self {
            inner: MemoryStore::new(),
            failures,
        }
    }

    fn gate(&self, failing: bool, op: &str) -> StoreResult<()> {
        if failing {
            Err(StoreError::Backend(format!("{op} unavailable")))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl UserStore for FlakyStore {
    async fn get_or_create(&self, platform_user_id: &str) -> StoreResult<User> {
        self.inner.get_or_create(platform_user_id).await
    }

    async fn get_by_platform_id(&self, platform_user_id: &str) -> StoreResult<User> {
        self.inner.get_by_platform_id(platform_user_id).await
    }

    async fn update_username(&self, user_id: &str, username: &str) -> StoreResult<()> {
        self.inner.update_username(user_id, username).await
    }
}

#[async_trait]
impl MessageStore for FlakyStore {
    async fn save(&self, message: &ConversationMessage) -> StoreResult<()> {
        self.gate(self.failures.save_message, "save message")?;
        MessageStore::save(&self.inner, message).await
    }

    async fn list_recent(
        &self,
        user_id: &str,
        window_minutes: i64,
    ) -> StoreResult<Vec<ConversationMessage>> {
        self.gate(self.failures.recent_messages, "recent messages")?;
        MessageStore::list_recent(&self.inner, user_id, window_minutes).await
    }

    async fn list_by_user(
        &self,
        user_id: &str,
        limit: usize,
    ) -> StoreResult<Vec<ConversationMessage>> {
        MessageStore::list_by_user(&self.inner, user_id, limit).await
    }
}

#[async_trait]
impl CheckInStore for FlakyStore {
    async fn create(&self, check_in: &CheckIn) -> StoreResult<()> {
        CheckInStore::create(&self.inner, check_in).await
    }

    async fn list_by_user(&self, user_id: &str, limit: usize) -> StoreResult<Vec<CheckIn>> {
        self.gate(self.failures.list_check_ins, "list check-ins")?;
        CheckInStore::list_by_user(&self.inner, user_id, limit).await
    }

    async fn stats(&self, user_id: &str, days: i64) -> StoreResult<CheckInStats> {
        self.gate(self.failures.check_in_stats, "check-in stats")?;
        self.inner.stats(user_id, days).await
    }

    async fn today(&self, user_id: &str) -> StoreResult<Option<CheckIn>> {
        self.inner.today(user_id).await
    }
}

#[async_trait]
impl ReflectionStore for FlakyStore {
    async fn create(&self, reflection: &Reflection) -> StoreResult<()> {
        ReflectionStore::create(&self.inner, reflection).await
    }

    async fn list_by_user(&self, user_id: &str, limit: usize) -> StoreResult<Vec<Reflection>> {
        self.gate(self.failures.list_reflections, "list reflections")?;
        ReflectionStore::list_by_user(&self.inner, user_id, limit).await
    }

    async fn list_recent(&self, user_id: &str, days: i64) -> StoreResult<Vec<Reflection>> {
        ReflectionStore::list_recent(&self.inner, user_id, days).await
    }
}
