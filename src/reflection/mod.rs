//! 反思记录

mod service;

use chrono::{DateTime, Utc};

pub use service::ReflectionService;

#[derive(Debug, Clone, PartialEq)]
pub struct Reflection {
    pub id: String,
    pub user_id: String,
    pub content: String,
    pub sentiment: String,
    /// 逗号分隔
    pub key_themes: String,
    pub ai_analysis: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reflection {
    pub fn new(user_id: &str, content: &str) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            content: content.to_string(),
            sentiment: String::new(),
            key_themes: String::new(),
            ai_analysis: String::new(),
            created_at: now,
            updated_at: now,
        }
    }
}
