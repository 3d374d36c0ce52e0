//! Eunoia 入口：加载配置、初始化日志、组装存储与 Provider，启动 HTTP 服务。
//!
//! 用法：`eunoia [config.toml]`

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use eunoia::config::{load_config, load_dotenv};
use eunoia::conversation::{AppState, ConversationService};
use eunoia::platforms::PlatformRegistry;
use eunoia::shutdown::ShutdownManager;
use eunoia::{llm, observability, server, store};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env 里的 RUST_LOG 要在订阅器安装前生效
    let dotenv_path = load_dotenv(None);
    observability::init();
    if let Some(path) = dotenv_path {
        tracing::info!("Loaded environment from {}", path.display());
    }

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let cfg = load_config(config_path).context("Failed to load configuration")?;

    let platform = PlatformRegistry::with_defaults()
        .get(&cfg.platform.name)
        .with_context(|| format!("Platform '{}' is not registered", cfg.platform.name))?;

    let stores = store::create_stores(cfg.database.url.as_deref()).await;
    let provider = llm::create_provider(&cfg.llm).context("Failed to create LLM provider")?;

    let conversation = ConversationService::new(stores, provider, cfg.conversation.clone());
    let state = AppState::new(platform, Arc::new(conversation));
    let app = server::build_router(
        state,
        &cfg.server.allowed_origins,
        &cfg.server.well_known_dir,
    );

    let shutdown = Arc::new(ShutdownManager::new());
    shutdown.install_signal_handlers();

    server::serve(app, &cfg.server.bind_addr, shutdown.token())
        .await
        .context("Server failed")?;

    Ok(())
}
