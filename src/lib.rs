//! Eunoia - A2A 消息网关与对话编排（情绪陪伴智能体）
//!
//! 模块划分：
//! - **a2a**: JSON-RPC 2.0 报文与错误码
//! - **platforms**: 平台适配器（Telex）与注册表
//! - **conversation**: 消息模型、对话编排、A2A 处理器
//! - **intent**: 规则意图识别（情绪打卡 / 反思）
//! - **checkin** / **reflection**: 打卡与反思服务
//! - **store**: 存储抽象（内存 / SQLite）
//! - **llm**: 生成式 Provider（Gemini / OpenAI 兼容 / Mock）
//! - **config**: 配置加载（TOML + 环境变量）
//! - **server**: 路由、CORS、静态文件
//! - **observability** / **shutdown**: 日志与优雅关闭

pub mod a2a;
pub mod checkin;
pub mod config;
pub mod conversation;
pub mod error;
pub mod intent;
pub mod llm;
pub mod observability;
pub mod platforms;
pub mod reflection;
pub mod server;
pub mod shutdown;
pub mod store;
pub mod user;

pub use error::{ServiceError, ServiceResult};
