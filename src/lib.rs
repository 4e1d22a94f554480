//! qq-avatar-meme - 表情包生成 + 头像印象插件
//!
//! 模块划分：
//! - **avatar**: 头像抓取、视觉分析、描述缓存（SQLite）与 prompt 门面
//! - **config**: 插件配置加载（TOML + 环境变量）
//! - **core**: 错误类型
//! - **host**: 宿主接缝（消息发送、Person 身份解析、事件）
//! - **llm**: 视觉模型抽象与实现（OpenAI 兼容 / Mock）
//! - **meme**: 表情包后端、目录、管理器、随机触发
//! - **observability**: 日志初始化
//! - **plugins**: 命令 / Action 组件与组合根

pub mod avatar;
pub mod config;
pub mod core;
pub mod host;
pub mod llm;
pub mod meme;
pub mod observability;
pub mod plugins;

pub use avatar::{format_head_description_for_relation, get_head_description_for_prompt};
pub use plugins::QqAvatarMemePlugin;
