//! 反思识别：足够长且带有内省措辞的消息

/// 触发反思记录的最少词数
pub const MIN_REFLECTION_WORDS: usize = 15;

pub const REFLECTION_INDICATORS: &[&str] = &[
    "today i",
    "i've been thinking",
    "i realized",
    "i noticed",
    "looking back",
    "i feel like",
    "lately i've",
    "i've noticed",
    "been feeling",
    "it's been",
    "struggling with",
    "grateful for",
    "thinking about",
    "i wonder",
    "reflecting on",
];

pub fn is_reflection(message: &str) -> bool {
    if message.split_whitespace().count() < MIN_REFLECTION_WORDS {
        return false;
    }
    let lower = message.to_lowercase();
    REFLECTION_INDICATORS
        .iter()
        .any(|indicator| lower.contains(indicator))
}
