//! 情绪打卡：记录、统计与趋势

mod service;

use chrono::{DateTime, Utc};

pub use service::{mood_insight, CheckInService};

#[derive(Debug, Clone, PartialEq)]
pub struct CheckIn {
    pub id: String,
    pub user_id: String,
    /// 1..=10
    pub mood_score: u8,
    pub mood_label: String,
    pub description: String,
    pub check_in_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl CheckIn {
    pub fn new(user_id: &str, mood_score: u8, mood_label: &str, description: &str) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            mood_score,
            mood_label: mood_label.to_string(),
            description: description.to_string(),
            check_in_date: now,
            created_at: now,
        }
    }
}

/// 趋势标签
pub const TREND_NEW: &str = "new";
pub const TREND_IMPROVING: &str = "improving";
pub const TREND_DECLINING: &str = "declining";
pub const TREND_STABLE: &str = "stable";

/// 打卡统计
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CheckInStats {
    /// 统计窗口内的平均分
    pub average_mood_score: f64,
    /// 统计窗口内的打卡数
    pub total_check_ins: usize,
    pub last_check_in: Option<CheckIn>,
    /// "" / new / improving / declining / stable
    pub mood_trend: String,
}

/// 由最近的打卡（按时间倒序）推断趋势：比较最新两条
pub fn mood_trend(latest_first: &[CheckIn]) -> String {
    match latest_first {
        [] => String::new(),
        [_] => TREND_NEW.to_string(),
        [latest, previous, ..] => {
            let trend = match latest.mood_score.cmp(&previous.mood_score) {
                std::cmp::Ordering::Greater => TREND_IMPROVING,
                std::cmp::Ordering::Less => TREND_DECLINING,
                std::cmp::Ordering::Equal => TREND_STABLE,
            };
            trend.to_string()
        }
    }
}

/// 从窗口内的打卡分数与最近两条打卡汇总统计
pub fn summarize(window_scores: &[u8], latest_first: &[CheckIn]) -> CheckInStats {
    let total = window_scores.len();
    let average = if total == 0 {
        0.0
    } else {
        window_scores.iter().map(|s| f64::from(*s)).sum::<f64>() / total as f64
    };

    CheckInStats {
        average_mood_score: average,
        total_check_ins: total,
        last_check_in: latest_first.first().cloned(),
        mood_trend: mood_trend(latest_first),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_score(score: u8) -> CheckIn {
        CheckIn::new("u", score, "x", "")
    }

    #[test]
    fn test_mood_trend() {
        assert_eq!(mood_trend(&[]), "");
        assert_eq!(mood_trend(&[with_score(5)]), "new");
        assert_eq!(mood_trend(&[with_score(8), with_score(7)]), "improving");
        assert_eq!(mood_trend(&[with_score(3), with_score(7)]), "declining");
        assert_eq!(mood_trend(&[with_score(6), with_score(6)]), "stable");
    }

    #[test]
    fn test_summarize_average() {
        let stats = summarize(&[8, 7], &[with_score(8), with_score(7)]);
        assert_eq!(stats.total_check_ins, 2);
        assert!((stats.average_mood_score - 7.5).abs() < f64::EPSILON);
        assert_eq!(stats.mood_trend, "improving");
        assert_eq!(stats.last_check_in.map(|c| c.mood_score), Some(8));
    }
}
