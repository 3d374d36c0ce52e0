//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 .env（dotenvy），再读 TOML 文件，最后用环境变量 `EUNOIA__*` 覆盖
//! （双下划线表示嵌套，如 `EUNOIA__LLM__PROVIDER=openai`）。

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerSettings,
    pub platform: PlatformSettings,
    pub database: DatabaseSettings,
    pub llm: LlmSettings,
    pub conversation: ConversationSettings,
}

/// [server] 段：监听地址、CORS、静态文件目录
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind_addr: String,
    /// 允许的来源；含 "*" 时放开所有来源
    pub allowed_origins: Vec<String>,
    /// /.well-known/ 下的静态文件目录（agent card）
    pub well_known_dir: PathBuf,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            allowed_origins: vec!["*".to_string()],
            well_known_dir: PathBuf::from(".well-known"),
        }
    }
}

/// [platform] 段：启用的平台适配器
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlatformSettings {
    pub name: String,
}

impl Default for PlatformSettings {
    fn default() -> Self {
        Self {
            name: "telex".to_string(),
        }
    }
}

/// [database] 段：未设置 url 时使用内存存储
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct DatabaseSettings {
    pub url: Option<String>,
}

/// [llm] 段：后端选择、模型、超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// gemini / openai / mock
    pub provider: String,
    /// 未设置时用各后端默认模型
    pub model: Option<String>,
    /// 未设置时回退到 GEMINI_API_KEY / OPENAI_API_KEY
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub temperature: f32,
    /// 单次 HTTP 调用超时（秒）
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            model: None,
            api_key: None,
            base_url: None,
            temperature: 0.9,
            timeout_secs: 60,
        }
    }
}

/// [conversation] 段：历史窗口、上下文条数与请求截止时间
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConversationSettings {
    /// 拉取最近多少分钟的对话作为历史
    pub history_window_minutes: i64,
    /// 提示词中最多保留的历史条数（取最新的）
    pub max_prompt_history: usize,
    pub checkin_context_limit: usize,
    pub reflection_context_limit: usize,
    pub stats_days: i64,
    /// 单次请求内所有协作调用的总截止时间（秒）
    pub request_timeout_secs: u64,
    /// 每个尽力而为步骤各自的时限（秒），同时不超过请求截止时间
    pub best_effort_timeout_secs: u64,
}

impl Default for ConversationSettings {
    fn default() -> Self {
        Self {
            history_window_minutes: 30,
            max_prompt_history: 10,
            checkin_context_limit: 5,
            reflection_context_limit: 3,
            stats_days: 7,
            request_timeout_secs: 90,
            best_effort_timeout_secs: 10,
        }
    }
}

/// 加载 .env（不存在则忽略），已存在的环境变量不会被覆盖
///
/// 传入 path 时只读该文件；否则从当前目录向上查找。
/// 须在 `observability::init` 之前调用，.env 中的 RUST_LOG 才会生效。
pub fn load_dotenv(path: Option<&Path>) -> Option<PathBuf> {
    match path {
        Some(p) => dotenvy::from_path(p).ok().map(|_| p.to_path_buf()),
        None => dotenvy::dotenv().ok(),
    }
}

/// 从 config 目录加载配置，环境变量 EUNOIA__* 可覆盖
///
/// 1. 尝试加载 .env（不存在则忽略）
/// 2. 按顺序查找 config/default.toml、../config/default.toml，找到则作为第一源
/// 3. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 4. 最后叠加环境变量 EUNOIA__*（双下划线表示嵌套键，allowed_origins 以逗号分隔）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    if let Some(path) = load_dotenv(None) {
        tracing::debug!("Loaded environment from {}", path.display());
    }

    let mut builder = config::Config::builder();

    for name in ["config/default", "../config/default"] {
        if std::path::Path::new(&format!("{name}.toml")).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        } else {
            tracing::warn!("Config file {} not found, ignored", path.display());
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("EUNOIA")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("server.allowed_origins")
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}
