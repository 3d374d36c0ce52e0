//! 情绪识别：按固定顺序的关键词表匹配「我感觉……」类表达

/// (关键词, 分数, 标签)；顺序即优先级，第一个命中的表项胜出
pub const MOOD_TABLE: &[(&str, u8, &str)] = &[
    ("amazing", 9, "joyful"),
    ("fantastic", 9, "joyful"),
    ("wonderful", 9, "joyful"),
    ("great", 8, "happy"),
    ("good", 7, "content"),
    ("happy", 8, "happy"),
    ("joyful", 9, "joyful"),
    ("excited", 8, "happy"),
    ("okay", 5, "neutral"),
    ("fine", 6, "content"),
    ("alright", 5, "neutral"),
    ("meh", 4, "low"),
    ("tired", 4, "low"),
    ("stressed", 3, "anxious"),
    ("anxious", 3, "anxious"),
    ("worried", 3, "anxious"),
    ("sad", 3, "sad"),
    ("down", 3, "sad"),
    ("depressed", 2, "very low"),
    ("terrible", 2, "very low"),
    ("awful", 2, "very low"),
    ("horrible", 2, "very low"),
    ("struggling", 3, "struggling"),
];

const PREFIXES: [&str; 4] = ["feel ", "feeling ", "i'm ", "i am "];

/// 识别结果；score 为 0 表示未识别到情绪
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoodReading {
    pub score: u8,
    pub label: &'static str,
}

impl MoodReading {
    pub const NONE: MoodReading = MoodReading { score: 0, label: "" };

    pub fn is_detected(&self) -> bool {
        self.score > 0
    }
}

/// 对原始文本做情绪识别（内部小写化）
pub fn detect_mood(message: &str) -> MoodReading {
    let lower = message.to_lowercase();

    MOOD_TABLE
        .iter()
        .find(|(keyword, _, _)| {
            PREFIXES
                .iter()
                .any(|prefix| lower.contains(&format!("{prefix}{keyword}")))
        })
        .map(|&(_, score, label)| MoodReading { score, label })
        .unwrap_or(MoodReading::NONE)
}
