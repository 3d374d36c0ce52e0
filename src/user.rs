//! 用户记录：首次接触时按平台用户标识惰性创建

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: String,
    /// 外部平台用户标识（唯一）
    pub platform_user_id: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(platform_user_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            platform_user_id: platform_user_id.into(),
            username: String::new(),
            created_at: now,
            updated_at: now,
        }
    }
}
