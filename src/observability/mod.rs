//! 可观测性：tracing 订阅器初始化
//!
//! 默认级别 info，可用 RUST_LOG 覆盖（如 `RUST_LOG=eunoia=debug,sqlx=warn`）。

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// 读取 var 指定的过滤指令，缺失或无效时用 info
fn env_filter(var: &str) -> EnvFilter {
    EnvFilter::try_from_env(var).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// 安装全局订阅器；.env 需已通过 `config::load_dotenv` 加载
pub fn init() {
    tracing_subscriber::registry()
        .with(env_filter(EnvFilter::DEFAULT_ENV))
        .with(fmt::layer().with_target(true))
        .init();
}
