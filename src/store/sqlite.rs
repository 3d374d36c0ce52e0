//! SQLite 持久化存储
//!
//! 时间统一以 UTC RFC 3339（微秒、Z 结尾）文本保存，字典序即时间序，窗口查询直接比较字符串。
//! users.platform_user_id 带 UNIQUE 约束：get_or_create 采用「插入冲突则忽略，再读取」，
//! 并发首次接触时只会留下一行。

#![cfg(feature = "async-sqlite")]

use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;

use super::{
    CheckInStore, MessageStore, ReflectionStore, StoreError, StoreResult, UserStore,
};
use crate::checkin::{summarize, CheckIn, CheckInStats};
use crate::conversation::{ConversationMessage, MessageRole};
use crate::reflection::Reflection;
use crate::user::User;

fn ts(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(s: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Backend(format!("invalid timestamp {s:?}: {e}")))
}

/// 接受 `sqlite:` URL 或裸文件路径
fn normalize_url(url: &str) -> String {
    if url.starts_with("sqlite:") {
        url.to_string()
    } else {
        format!("sqlite:{url}?mode=rwc")
    }
}

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// 连接数据库并建表
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&normalize_url(url))
            .await?;

        let store = Self { pool };
        store.init_tables().await?;
        Ok(store)
    }

    async fn init_tables(&self) -> StoreResult<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                platform_user_id TEXT NOT NULL UNIQUE,
                username TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS conversation_history (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                message_role TEXT NOT NULL,
                message_content TEXT NOT NULL,
                message_id TEXT,
                context_data TEXT,
                created_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS emotional_checkins (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                mood_score INTEGER NOT NULL,
                mood_label TEXT NOT NULL,
                description TEXT NOT NULL,
                check_in_date TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS reflections (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                content TEXT NOT NULL,
                sentiment TEXT NOT NULL,
                key_themes TEXT NOT NULL,
                ai_analysis TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        for index in [
            "CREATE INDEX IF NOT EXISTS idx_history_user_created ON conversation_history(user_id, created_at)",
            "CREATE INDEX IF NOT EXISTS idx_checkins_user_date ON emotional_checkins(user_id, check_in_date)",
            "CREATE INDEX IF NOT EXISTS idx_reflections_user_created ON reflections(user_id, created_at)",
        ] {
            sqlx::query(index).execute(&self.pool).await?;
        }

        Ok(())
    }

    async fn find_user(&self, platform_user_id: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query(
            "SELECT id, platform_user_id, username, created_at, updated_at
             FROM users WHERE platform_user_id = ?",
        )
        .bind(platform_user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| user_from_row(&r)).transpose()
    }
}

fn user_from_row(row: &SqliteRow) -> StoreResult<User> {
    Ok(User {
        id: row.try_get("id")?,
        platform_user_id: row.try_get("platform_user_id")?,
        username: row.try_get("username")?,
        created_at: parse_ts(&row.try_get::<String, _>("created_at")?)?,
        updated_at: parse_ts(&row.try_get::<String, _>("updated_at")?)?,
    })
}

fn message_from_row(row: &SqliteRow) -> StoreResult<ConversationMessage> {
    let role: String = row.try_get("message_role")?;
    Ok(ConversationMessage {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        role: MessageRole::parse(&role)
            .ok_or_else(|| StoreError::Backend(format!("invalid message role {role:?}")))?,
        content: row.try_get("message_content")?,
        message_id: row.try_get("message_id")?,
        context_data: row.try_get("context_data")?,
        created_at: parse_ts(&row.try_get::<String, _>("created_at")?)?,
    })
}

fn mood_score(row: &SqliteRow) -> StoreResult<u8> {
    let score: i64 = row.try_get("mood_score")?;
    u8::try_from(score).map_err(|_| StoreError::Backend(format!("mood score out of range: {score}")))
}

fn check_in_from_row(row: &SqliteRow) -> StoreResult<CheckIn> {
    Ok(CheckIn {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        mood_score: mood_score(row)?,
        mood_label: row.try_get("mood_label")?,
        description: row.try_get("description")?,
        check_in_date: parse_ts(&row.try_get::<String, _>("check_in_date")?)?,
        created_at: parse_ts(&row.try_get::<String, _>("created_at")?)?,
    })
}

fn reflection_from_row(row: &SqliteRow) -> StoreResult<Reflection> {
    Ok(Reflection {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        content: row.try_get("content")?,
        sentiment: row.try_get("sentiment")?,
        key_themes: row.try_get("key_themes")?,
        ai_analysis: row.try_get("ai_analysis")?,
        created_at: parse_ts(&row.try_get::<String, _>("created_at")?)?,
        updated_at: parse_ts(&row.try_get::<String, _>("updated_at")?)?,
    })
}

const MESSAGE_COLUMNS: &str =
    "id, user_id, message_role, message_content, message_id, context_data, created_at";
const CHECK_IN_COLUMNS: &str =
    "id, user_id, mood_score, mood_label, description, check_in_date, created_at";
const REFLECTION_COLUMNS: &str =
    "id, user_id, content, sentiment, key_themes, ai_analysis, created_at, updated_at";

/// SQLite LIMIT 使用 i64
fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

#[async_trait]
impl UserStore for SqliteStore {
    async fn get_or_create(&self, platform_user_id: &str) -> StoreResult<User> {
        if let Some(user) = self.find_user(platform_user_id).await? {
            return Ok(user);
        }

        let candidate = User::new(platform_user_id);
        let inserted = sqlx::query(
            "INSERT INTO users (id, platform_user_id, username, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(platform_user_id) DO NOTHING",
        )
        .bind(&candidate.id)
        .bind(&candidate.platform_user_id)
        .bind(&candidate.username)
        .bind(ts(&candidate.created_at))
        .bind(ts(&candidate.updated_at))
        .execute(&self.pool)
        .await?;

        if inserted.rows_affected() > 0 {
            tracing::info!(platform_user_id, user_id = %candidate.id, "user created");
        }

        self.find_user(platform_user_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("user {platform_user_id}")))
    }

    async fn get_by_platform_id(&self, platform_user_id: &str) -> StoreResult<User> {
        self.find_user(platform_user_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("user {platform_user_id}")))
    }

    async fn update_username(&self, user_id: &str, username: &str) -> StoreResult<()> {
        let result = sqlx::query("UPDATE users SET username = ?, updated_at = ? WHERE id = ?")
            .bind(username)
            .bind(ts(&Utc::now()))
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("user {user_id}")));
        }
        Ok(())
    }
}

#[async_trait]
impl MessageStore for SqliteStore {
    async fn save(&self, message: &ConversationMessage) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO conversation_history
             (id, user_id, message_role, message_content, message_id, context_data, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&message.id)
        .bind(&message.user_id)
        .bind(message.role.as_str())
        .bind(&message.content)
        .bind(&message.message_id)
        .bind(&message.context_data)
        .bind(ts(&message.created_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_recent(
        &self,
        user_id: &str,
        window_minutes: i64,
    ) -> StoreResult<Vec<ConversationMessage>> {
        let since = Utc::now() - Duration::minutes(window_minutes);
        let rows = sqlx::query(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM conversation_history
             WHERE user_id = ? AND created_at >= ?
             ORDER BY created_at ASC, rowid ASC"
        ))
        .bind(user_id)
        .bind(ts(&since))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(message_from_row).collect()
    }

    async fn list_by_user(
        &self,
        user_id: &str,
        limit: usize,
    ) -> StoreResult<Vec<ConversationMessage>> {
        let rows = sqlx::query(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM conversation_history
             WHERE user_id = ?
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?"
        ))
        .bind(user_id)
        .bind(sql_limit(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(message_from_row).collect()
    }
}

#[async_trait]
impl CheckInStore for SqliteStore {
    async fn create(&self, check_in: &CheckIn) -> StoreResult<()> {
        sqlx::query(&format!(
            "INSERT INTO emotional_checkins ({CHECK_IN_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(&check_in.id)
        .bind(&check_in.user_id)
        .bind(i64::from(check_in.mood_score))
        .bind(&check_in.mood_label)
        .bind(&check_in.description)
        .bind(ts(&check_in.check_in_date))
        .bind(ts(&check_in.created_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_by_user(&self, user_id: &str, limit: usize) -> StoreResult<Vec<CheckIn>> {
        let rows = sqlx::query(&format!(
            "SELECT {CHECK_IN_COLUMNS} FROM emotional_checkins
             WHERE user_id = ?
             ORDER BY check_in_date DESC, created_at DESC, rowid DESC
             LIMIT ?"
        ))
        .bind(user_id)
        .bind(sql_limit(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(check_in_from_row).collect()
    }

    async fn stats(&self, user_id: &str, days: i64) -> StoreResult<CheckInStats> {
        let since = Utc::now() - Duration::days(days);
        let rows = sqlx::query(
            "SELECT mood_score FROM emotional_checkins WHERE user_id = ? AND check_in_date >= ?",
        )
        .bind(user_id)
        .bind(ts(&since))
        .fetch_all(&self.pool)
        .await?;

        let window_scores = rows.iter().map(mood_score).collect::<StoreResult<Vec<_>>>()?;

        let latest = CheckInStore::list_by_user(self, user_id, 2).await?;
        Ok(summarize(&window_scores, &latest))
    }

    async fn today(&self, user_id: &str) -> StoreResult<Option<CheckIn>> {
        let today = Utc::now().format("%Y-%m-%d").to_string();
        let row = sqlx::query(&format!(
            "SELECT {CHECK_IN_COLUMNS} FROM emotional_checkins
             WHERE user_id = ? AND substr(check_in_date, 1, 10) = ?
             ORDER BY created_at DESC, rowid DESC
             LIMIT 1"
        ))
        .bind(user_id)
        .bind(today)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(check_in_from_row).transpose()
    }
}

#[async_trait]
impl ReflectionStore for SqliteStore {
    async fn create(&self, reflection: &Reflection) -> StoreResult<()> {
        sqlx::query(&format!(
            "INSERT INTO reflections ({REFLECTION_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(&reflection.id)
        .bind(&reflection.user_id)
        .bind(&reflection.content)
        .bind(&reflection.sentiment)
        .bind(&reflection.key_themes)
        .bind(&reflection.ai_analysis)
        .bind(ts(&reflection.created_at))
        .bind(ts(&reflection.updated_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_by_user(&self, user_id: &str, limit: usize) -> StoreResult<Vec<Reflection>> {
        let rows = sqlx::query(&format!(
            "SELECT {REFLECTION_COLUMNS} FROM reflections
             WHERE user_id = ?
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?"
        ))
        .bind(user_id)
        .bind(sql_limit(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(reflection_from_row).collect()
    }

    async fn list_recent(&self, user_id: &str, days: i64) -> StoreResult<Vec<Reflection>> {
        let since = Utc::now() - Duration::days(days);
        let rows = sqlx::query(&format!(
            "SELECT {REFLECTION_COLUMNS} FROM reflections
             WHERE user_id = ? AND created_at >= ?
             ORDER BY created_at DESC, rowid DESC"
        ))
        .bind(user_id)
        .bind(ts(&since))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(reflection_from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn temp_store() -> (tempfile::TempDir, SqliteStore) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("eunoia.db");
        let store = SqliteStore::connect(path.to_str().unwrap()).await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_get_or_create_same_id() {
        let (_dir, store) = temp_store().await;
        let a = store.get_or_create("telex-42").await.unwrap();
        let b = store.get_or_create("telex-42").await.unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(store.get_by_platform_id("telex-42").await.unwrap().id, a.id);
        assert!(matches!(
            store.get_by_platform_id("ghost").await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_messages_round_trip_in_order() {
        let (_dir, store) = temp_store().await;
        let base = Utc::now() - Duration::minutes(10);
        for i in 0..3 {
            let mut m = ConversationMessage::new("u1", MessageRole::User, format!("m{i}"))
                .with_message_id("req-1");
            m.created_at = base + Duration::seconds(i);
            store.save(&m).await.unwrap();
        }
        let reply = ConversationMessage::new("u1", MessageRole::Assistant, "reply").with_context("ctx");
        store.save(&reply).await.unwrap();

        let recent = MessageStore::list_recent(&store, "u1", 30).await.unwrap();
        let contents: Vec<&str> = recent.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m0", "m1", "m2", "reply"]);
        assert_eq!(recent[0].message_id.as_deref(), Some("req-1"));
        assert_eq!(recent[3].role, MessageRole::Assistant);
        assert_eq!(recent[3].context_data.as_deref(), Some("ctx"));

        let latest = MessageStore::list_by_user(&store, "u1", 2).await.unwrap();
        assert_eq!(latest[0].content, "reply");
        assert_eq!(latest[1].content, "m2");
    }

    #[tokio::test]
    async fn test_check_in_stats() {
        let (_dir, store) = temp_store().await;
        let mut older = CheckIn::new("u1", 7, "content", "Good");
        older.check_in_date = Utc::now() - Duration::hours(24);
        CheckInStore::create(&store, &older).await.unwrap();
        CheckInStore::create(&store, &CheckIn::new("u1", 8, "happy", "Great"))
            .await
            .unwrap();

        let stats = store.stats("u1", 7).await.unwrap();
        assert_eq!(stats.total_check_ins, 2);
        assert!((stats.average_mood_score - 7.5).abs() < 1e-9);
        assert_eq!(stats.mood_trend, "improving");
        assert_eq!(stats.last_check_in.map(|c| c.mood_score), Some(8));

        let today = store.today("u1").await.unwrap().unwrap();
        assert_eq!(today.mood_score, 8);
    }

    #[tokio::test]
    async fn test_stats_rejects_out_of_range_score() {
        let (_dir, store) = temp_store().await;
        CheckInStore::create(&store, &CheckIn::new("u1", 8, "happy", ""))
            .await
            .unwrap();
        sqlx::query("UPDATE emotional_checkins SET mood_score = 300 WHERE user_id = ?")
            .bind("u1")
            .execute(&store.pool)
            .await
            .unwrap();

        assert!(matches!(store.stats("u1", 7).await, Err(StoreError::Backend(_))));
    }

    #[tokio::test]
    async fn test_reflections() {
        let (_dir, store) = temp_store().await;
        let mut r = Reflection::new("u1", "thinking about change");
        r.sentiment = "mixed".into();
        ReflectionStore::create(&store, &r).await.unwrap();

        let list = ReflectionStore::list_by_user(&store, "u1", 3).await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].sentiment, "mixed");
        assert_eq!(
            ReflectionStore::list_recent(&store, "u1", 7).await.unwrap().len(),
            1
        );
    }
}
