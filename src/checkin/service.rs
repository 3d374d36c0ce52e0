//! 打卡服务：创建、查询与情绪洞察文案

use std::sync::Arc;

use super::{CheckIn, CheckInStats, TREND_DECLINING, TREND_IMPROVING, TREND_NEW, TREND_STABLE};
use crate::error::{ServiceError, ServiceResult};
use crate::store::{CheckInStore, UserStore};

#[derive(Clone)]
pub struct CheckInService {
    users: Arc<dyn UserStore>,
    check_ins: Arc<dyn CheckInStore>,
}

impl CheckInService {
    pub fn new(users: Arc<dyn UserStore>, check_ins: Arc<dyn CheckInStore>) -> Self {
        Self { users, check_ins }
    }

    /// 分数必须在 1..=10；用户不存在时自动创建
    #[tracing::instrument(skip(self, description))]
    pub async fn create_check_in(
        &self,
        platform_user_id: &str,
        mood_score: u8,
        mood_label: &str,
        description: &str,
    ) -> ServiceResult<CheckIn> {
        if !(1..=10).contains(&mood_score) {
            return Err(ServiceError::InvalidMoodScore(mood_score));
        }

        let user = self.users.get_or_create(platform_user_id).await?;
        let check_in = CheckIn::new(&user.id, mood_score, mood_label, description);
        self.check_ins.create(&check_in).await?;

        tracing::info!(check_in_id = %check_in.id, "check-in created");
        Ok(check_in)
    }

    pub async fn history(&self, platform_user_id: &str, limit: usize) -> ServiceResult<Vec<CheckIn>> {
        let user = self
            .users
            .get_by_platform_id(platform_user_id)
            .await
            .map_err(|e| ServiceError::from_user_lookup(e, platform_user_id))?;
        Ok(self.check_ins.list_by_user(&user.id, limit).await?)
    }

    pub async fn stats(&self, platform_user_id: &str, days: i64) -> ServiceResult<CheckInStats> {
        let user = self
            .users
            .get_by_platform_id(platform_user_id)
            .await
            .map_err(|e| ServiceError::from_user_lookup(e, platform_user_id))?;
        Ok(self.check_ins.stats(&user.id, days).await?)
    }

    pub async fn today(&self, platform_user_id: &str) -> ServiceResult<Option<CheckIn>> {
        let user = self
            .users
            .get_by_platform_id(platform_user_id)
            .await
            .map_err(|e| ServiceError::from_user_lookup(e, platform_user_id))?;
        Ok(self.check_ins.today(&user.id).await?)
    }
}

/// 根据统计生成一句情绪洞察
pub fn mood_insight(stats: &CheckInStats) -> String {
    if stats.total_check_ins == 0 {
        return "Welcome! Start tracking your emotional wellbeing by sharing how you're feeling today."
            .to_string();
    }

    let mut insight = format!(
        "Over the past period, your average mood has been {:.1}/10. ",
        stats.average_mood_score
    );
    let trend_sentence = match stats.mood_trend.as_str() {
        TREND_IMPROVING => "Your mood is trending upward, which is wonderful to see!",
        TREND_DECLINING => {
            "I notice your mood has been declining. Remember, it's okay to have difficult days."
        }
        TREND_STABLE => "Your mood has been stable, which shows consistency.",
        TREND_NEW => "Keep tracking to see patterns over time.",
        _ => "",
    };
    insight.push_str(trend_sentence);
    insight
}
