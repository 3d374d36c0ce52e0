//! 意图识别模块
//!
//! 无状态的纯规则识别（不调用 LLM）：情绪打卡、反思记录。
//! 识别结果由编排层转成副作用（创建打卡 / 反思），失败只记日志。

mod mood;
mod reflection;

pub use mood::{detect_mood, MoodReading, MOOD_TABLE};
pub use reflection::{is_reflection, MIN_REFLECTION_WORDS, REFLECTION_INDICATORS};

/// 识别出的意图
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// 自动情绪打卡
    CheckIn { score: u8, label: &'static str },
    /// 自动反思记录
    Reflection,
}

/// 意图识别器
#[derive(Debug, Clone, Copy, Default)]
pub struct IntentRecognizer;

impl IntentRecognizer {
    pub fn new() -> Self {
        Self
    }

    /// 返回消息触发的全部意图（顺序：打卡在前、反思在后）
    pub fn recognize(&self, message: &str) -> Vec<Intent> {
        let mut intents = Vec::new();

        let mood = detect_mood(message);
        if mood.is_detected() {
            intents.push(Intent::CheckIn {
                score: mood.score,
                label: mood.label,
            });
        }

        if is_reflection(message) {
            intents.push(Intent::Reflection);
        }

        intents
    }
}
