//! 内存存储：默认后端，也用作测试替身
//!
//! get_or_create 在同一把写锁内完成「查找或插入」，并发首次接触不会产生重复用户。

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::RwLock;

use super::{
    CheckInStore, MessageStore, ReflectionStore, StoreError, StoreResult, UserStore,
};
use crate::checkin::{summarize, CheckIn, CheckInStats};
use crate::conversation::ConversationMessage;
use crate::reflection::Reflection;
use crate::user::User;

#[derive(Default)]
pub struct MemoryStore {
    /// platform_user_id -> User
    users: RwLock<HashMap<String, User>>,
    messages: RwLock<Vec<ConversationMessage>>,
    check_ins: RwLock<Vec<CheckIn>>,
    reflections: RwLock<Vec<Reflection>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn user_count(&self) -> usize {
        self.users.read().await.len()
    }
}

/// 稳定排序后反转：按时间倒序，同一时间的后插入者在前
fn latest_first<T, F>(mut items: Vec<T>, key: F) -> Vec<T>
where
    F: Fn(&T) -> chrono::DateTime<Utc>,
{
    items.sort_by_key(|item| key(item));
    items.reverse();
    items
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn get_or_create(&self, platform_user_id: &str) -> StoreResult<User> {
        if let Some(user) = self.users.read().await.get(platform_user_id) {
            return Ok(user.clone());
        }

        let mut users = self.users.write().await;
        let user = users
            .entry(platform_user_id.to_string())
            .or_insert_with(|| {
                tracing::info!(platform_user_id, "creating new user");
                User::new(platform_user_id)
            });
        Ok(user.clone())
    }

    async fn get_by_platform_id(&self, platform_user_id: &str) -> StoreResult<User> {
        self.users
            .read()
            .await
            .get(platform_user_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("user {platform_user_id}")))
    }

    async fn update_username(&self, user_id: &str, username: &str) -> StoreResult<()> {
        let mut users = self.users.write().await;
        let user = users
            .values_mut()
            .find(|u| u.id == user_id)
            .ok_or_else(|| StoreError::NotFound(format!("user {user_id}")))?;
        user.username = username.to_string();
        user.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn save(&self, message: &ConversationMessage) -> StoreResult<()> {
        self.messages.write().await.push(message.clone());
        Ok(())
    }

    async fn list_recent(
        &self,
        user_id: &str,
        window_minutes: i64,
    ) -> StoreResult<Vec<ConversationMessage>> {
        let since = Utc::now() - Duration::minutes(window_minutes);
        let mut recent: Vec<ConversationMessage> = self
            .messages
            .read()
            .await
            .iter()
            .filter(|m| m.user_id == user_id && m.created_at >= since)
            .cloned()
            .collect();
        recent.sort_by_key(|m| m.created_at);
        Ok(recent)
    }

    async fn list_by_user(
        &self,
        user_id: &str,
        limit: usize,
    ) -> StoreResult<Vec<ConversationMessage>> {
        let owned: Vec<ConversationMessage> = self
            .messages
            .read()
            .await
            .iter()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect();
        let mut latest = latest_first(owned, |m| m.created_at);
        latest.truncate(limit);
        Ok(latest)
    }
}

#[async_trait]
impl CheckInStore for MemoryStore {
    async fn create(&self, check_in: &CheckIn) -> StoreResult<()> {
        self.check_ins.write().await.push(check_in.clone());
        Ok(())
    }

    async fn list_by_user(&self, user_id: &str, limit: usize) -> StoreResult<Vec<CheckIn>> {
        let owned: Vec<CheckIn> = self
            .check_ins
            .read()
            .await
            .iter()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        let mut latest = latest_first(owned, |c| c.check_in_date);
        latest.truncate(limit);
        Ok(latest)
    }

    async fn stats(&self, user_id: &str, days: i64) -> StoreResult<CheckInStats> {
        let since = Utc::now() - Duration::days(days);
        let window_scores: Vec<u8> = self
            .check_ins
            .read()
            .await
            .iter()
            .filter(|c| c.user_id == user_id && c.check_in_date >= since)
            .map(|c| c.mood_score)
            .collect();
        let latest = CheckInStore::list_by_user(self, user_id, 2).await?;
        Ok(summarize(&window_scores, &latest))
    }

    async fn today(&self, user_id: &str) -> StoreResult<Option<CheckIn>> {
        let today = Utc::now().date_naive();
        let todays: Vec<CheckIn> = self
            .check_ins
            .read()
            .await
            .iter()
            .filter(|c| c.user_id == user_id && c.check_in_date.date_naive() == today)
            .cloned()
            .collect();
        Ok(latest_first(todays, |c| c.created_at).into_iter().next())
    }
}

#[async_trait]
impl ReflectionStore for MemoryStore {
    async fn create(&self, reflection: &Reflection) -> StoreResult<()> {
        self.reflections.write().await.push(reflection.clone());
        Ok(())
    }

    async fn list_by_user(&self, user_id: &str, limit: usize) -> StoreResult<Vec<Reflection>> {
        let owned: Vec<Reflection> = self
            .reflections
            .read()
            .await
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        let mut latest = latest_first(owned, |r| r.created_at);
        latest.truncate(limit);
        Ok(latest)
    }

    async fn list_recent(&self, user_id: &str, days: i64) -> StoreResult<Vec<Reflection>> {
        let since = Utc::now() - Duration::days(days);
        let owned: Vec<Reflection> = self
            .reflections
            .read()
            .await
            .iter()
            .filter(|r| r.user_id == user_id && r.created_at >= since)
            .cloned()
            .collect();
        Ok(latest_first(owned, |r| r.created_at))
    }
}
