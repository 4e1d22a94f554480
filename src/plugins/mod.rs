//! 插件组件系统
//!
//! 提供命令与 Action 两类组件的标准接口，以及按配置开关注册组件的组合根。
//!
//! 组件类型：
//! - 命令：按正则匹配聊天消息（/menu、/meme）
//! - Action：宿主 AI 层每轮咨询 matches，命中后 execute（auto_meme、analyze_avatar）

pub mod actions;
pub mod commands;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;

use crate::avatar::{get_head_description_for_prompt, AvatarAnalyzer};
use crate::config::PluginConfig;
use crate::core::PluginError;
use crate::host::{ActionEvent, MessageEvent, MessageSender};
use crate::meme::{ImageArtifact, MemeBackend, MemeManager};

pub use actions::{AnalyzeAvatarAction, AutoMemeAction, ANALYZE_AVATAR, AUTO_MEME};
pub use commands::{MemeGenerateCommand, MemeMenuCommand};

/// 命令执行结果：是否成功、日志说明、是否拦截后续处理
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    pub success: bool,
    pub message: String,
    pub intercept: bool,
}

impl CommandOutcome {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            intercept: true,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            intercept: true,
        }
    }
}

/// Action 执行结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionOutcome {
    pub success: bool,
    pub message: String,
}

impl ActionOutcome {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// 命令执行上下文：原始消息、命名捕获组、回复通道
pub struct CommandContext<'a> {
    pub event: &'a MessageEvent,
    pub groups: HashMap<String, String>,
    pub sender: &'a dyn MessageSender,
}

impl<'a> CommandContext<'a> {
    /// 命名捕获组，未匹配时为空串
    pub fn group(&self, name: &str) -> &str {
        self.groups.get(name).map(String::as_str).unwrap_or("")
    }

    pub async fn reply(&self, text: &str) -> Result<(), PluginError> {
        self.sender
            .send_text(&self.event.chat_id, text)
            .await
            .map_err(PluginError::ExecutionFailed)
    }

    pub async fn send_image(&self, image: &ImageArtifact) -> Result<(), PluginError> {
        self.sender
            .send_image(&self.event.chat_id, image)
            .await
            .map_err(PluginError::ExecutionFailed)
    }
}

/// 命令 trait
#[async_trait]
pub trait Command: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// 匹配整条消息（已 trim）的正则
    fn pattern(&self) -> &Regex;

    async fn execute(&self, ctx: &CommandContext<'_>) -> Result<CommandOutcome, PluginError>;
}

/// Action trait：matches 每轮至多咨询一次，不重试
#[async_trait]
pub trait Action: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn matches(&self, event: &ActionEvent) -> bool;

    async fn execute(
        &self,
        event: &ActionEvent,
        sender: &dyn MessageSender,
    ) -> Result<ActionOutcome, PluginError>;
}

/// 组件注册表：宿主分发器据此查找命令与 Action
pub struct ComponentRegistry {
    commands: Vec<Arc<dyn Command>>,
    actions: Vec<Arc<dyn Action>>,
    sender: Arc<dyn MessageSender>,
}

impl ComponentRegistry {
    pub fn new(sender: Arc<dyn MessageSender>) -> Self {
        Self {
            commands: Vec::new(),
            actions: Vec::new(),
            sender,
        }
    }

    pub fn register_command(&mut self, command: Arc<dyn Command>) -> Result<(), PluginError> {
        let name = command.name().to_string();
        if self.commands.iter().any(|c| c.name() == name) {
            return Err(PluginError::AlreadyRegistered(name));
        }
        tracing::debug!("Registered command: {}", name);
        self.commands.push(command);
        Ok(())
    }

    pub fn register_action(&mut self, action: Arc<dyn Action>) -> Result<(), PluginError> {
        let name = action.name().to_string();
        if self.actions.iter().any(|a| a.name() == name) {
            return Err(PluginError::AlreadyRegistered(name));
        }
        tracing::debug!("Registered action: {}", name);
        self.actions.push(action);
        Ok(())
    }

    pub fn command_names(&self) -> Vec<String> {
        self.commands.iter().map(|c| c.name().to_string()).collect()
    }

    pub fn action_names(&self) -> Vec<String> {
        self.actions.iter().map(|a| a.name().to_string()).collect()
    }

    /// 返回 (name, description) 列表，宿主可用于生成 Action 选择提示
    pub fn action_descriptions(&self) -> Vec<(String, String)> {
        self.actions
            .iter()
            .map(|a| (a.name().to_string(), a.description().to_string()))
            .collect()
    }

    /// 分发一条聊天消息；没有命令匹配时返回 None，交由宿主继续处理
    pub async fn handle_message(&self, event: &MessageEvent) -> Option<CommandOutcome> {
        let text = event.text.trim();
        for command in &self.commands {
            let Some(caps) = command.pattern().captures(text) else {
                continue;
            };
            let groups = command
                .pattern()
                .capture_names()
                .flatten()
                .filter_map(|n| caps.name(n).map(|m| (n.to_string(), m.as_str().to_string())))
                .collect();
            let ctx = CommandContext {
                event,
                groups,
                sender: self.sender.as_ref(),
            };

            tracing::info!(command = command.name(), user_id = %event.user_id, "command invoke");
            let outcome = command.execute(&ctx).await.unwrap_or_else(|e| {
                tracing::error!(command = command.name(), error = %e, "command failed");
                CommandOutcome::failed(e.to_string())
            });
            return Some(outcome);
        }
        None
    }

    /// 一个对话轮次：按注册顺序取第一个 matches 的 Action 执行（不并行）
    pub async fn handle_turn(&self, event: &ActionEvent) -> Option<(String, ActionOutcome)> {
        let action = self.actions.iter().find(|a| a.matches(event))?;
        let name = action.name().to_string();
        tracing::info!(action = %name, chat_id = %event.chat_id, "action invoke");
        let outcome = action
            .execute(event, self.sender.as_ref())
            .await
            .unwrap_or_else(|e| {
                tracing::error!(action = %name, error = %e, "action failed");
                ActionOutcome::failed(e.to_string())
            });
        Some((name, outcome))
    }
}

/// 组合根：按配置开关构建并注册组件，持有唯一的 MemeManager 与 AvatarAnalyzer
pub struct QqAvatarMemePlugin {
    memes: Arc<MemeManager>,
    avatars: Arc<AvatarAnalyzer>,
    registry: ComponentRegistry,
}

impl QqAvatarMemePlugin {
    pub fn new(
        config: &PluginConfig,
        backend: Arc<dyn MemeBackend>,
        avatars: AvatarAnalyzer,
        sender: Arc<dyn MessageSender>,
    ) -> Result<Self, PluginError> {
        let memes = Arc::new(MemeManager::new(backend));
        let avatars = Arc::new(avatars.with_analysis_enabled(config.avatar.enable_analysis));
        let mut registry = ComponentRegistry::new(sender);

        if !config.plugin.enabled {
            tracing::info!("plugin disabled, no components registered");
            return Ok(Self {
                memes,
                avatars,
                registry,
            });
        }

        if config.meme.enable_command_mode {
            registry.register_command(Arc::new(MemeMenuCommand::new(
                Arc::clone(&memes),
                config.meme.menu_limit,
            )?))?;
            registry.register_command(Arc::new(MemeGenerateCommand::new(Arc::clone(&memes))?))?;
        }

        if config.meme.enable_action_mode {
            let p = config.meme.trigger_probability;
            if !(0.0..=1.0).contains(&p) {
                return Err(PluginError::Config(format!(
                    "meme.trigger_probability must be within [0, 1], got {}",
                    p
                )));
            }
            registry.register_action(Arc::new(AutoMemeAction::new(Arc::clone(&memes), p)))?;
        }

        if config.avatar.enable_analysis {
            registry.register_action(Arc::new(AnalyzeAvatarAction::new(Arc::clone(&avatars))))?;
        }

        Ok(Self {
            memes,
            avatars,
            registry,
        })
    }

    /// 加载表情包目录；失败只记日志，功能降级为不可用
    pub async fn start(&self) {
        if let Err(e) = self.memes.reload().await {
            tracing::warn!(error = %e, "meme catalog unavailable, meme features disabled");
        }
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    pub fn memes(&self) -> &Arc<MemeManager> {
        &self.memes
    }

    /// 供宿主 prompt 构建调用的头像印象
    pub async fn head_description_for_prompt(&self, person_id: &str) -> Option<String> {
        get_head_description_for_prompt(&self.avatars, person_id).await
    }
}
