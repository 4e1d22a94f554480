//! Action 组件：宿主 AI 层可自主触发的行为
//!
//! - auto_meme：随机激活（默认 15%）或被显式请求时，生成并发送表情包
//! - analyze_avatar：只在显式请求时执行，分析用户头像并写库

use std::sync::Arc;

use async_trait::async_trait;

use crate::avatar::AvatarAnalyzer;
use crate::core::{MemeError, PluginError};
use crate::host::{ActionEvent, MessageSender};
use crate::meme::{trigger, MemeManager};

use super::{Action, ActionOutcome};

pub const AUTO_MEME: &str = "auto_meme";
pub const ANALYZE_AVATAR: &str = "analyze_avatar";

pub struct AutoMemeAction {
    memes: Arc<MemeManager>,
    probability: f64,
}

impl AutoMemeAction {
    pub fn new(memes: Arc<MemeManager>, probability: f64) -> Self {
        Self { memes, probability }
    }
}

#[async_trait]
impl Action for AutoMemeAction {
    fn name(&self) -> &str {
        AUTO_MEME
    }

    fn description(&self) -> &str {
        "智能选择并生成表情包发送"
    }

    /// 显式请求时必定匹配；宿主未指定 Action 时每轮抽一次签
    fn matches(&self, event: &ActionEvent) -> bool {
        match event.requested.as_deref() {
            Some(name) => name == AUTO_MEME,
            None => trigger::should_trigger(self.probability),
        }
    }

    async fn execute(
        &self,
        event: &ActionEvent,
        sender: &dyn MessageSender,
    ) -> Result<ActionOutcome, PluginError> {
        let texts = event.data_texts("texts");

        let picked = match event.data_str("meme_key") {
            Some(key) => self.memes.find_meme(key).await.map(Some),
            None => self.memes.random_meme().await,
        };
        let entry = match picked {
            Ok(Some(entry)) => entry,
            Ok(None) | Err(MemeError::NotFound { .. }) => {
                return Ok(ActionOutcome::failed("没有可用的表情包"))
            }
            Err(e) => return Ok(ActionOutcome::failed(e.to_string())),
        };

        match self.memes.generate(&entry, &texts).await {
            Ok(image) => {
                sender
                    .send_image(&event.chat_id, &image)
                    .await
                    .map_err(PluginError::ExecutionFailed)?;
                Ok(ActionOutcome::success(format!("发送了表情包: {}", entry.key)))
            }
            Err(e) => Ok(ActionOutcome::failed(e.to_string())),
        }
    }
}

pub struct AnalyzeAvatarAction {
    avatars: Arc<AvatarAnalyzer>,
}

impl AnalyzeAvatarAction {
    pub fn new(avatars: Arc<AvatarAnalyzer>) -> Self {
        Self { avatars }
    }
}

#[async_trait]
impl Action for AnalyzeAvatarAction {
    fn name(&self) -> &str {
        ANALYZE_AVATAR
    }

    fn description(&self) -> &str {
        "分析用户头像并存储描述信息"
    }

    fn matches(&self, event: &ActionEvent) -> bool {
        event.is_requested(ANALYZE_AVATAR)
    }

    async fn execute(
        &self,
        event: &ActionEvent,
        _sender: &dyn MessageSender,
    ) -> Result<ActionOutcome, PluginError> {
        let user_id = event.data_str("user_id").unwrap_or(event.user_id.as_str());
        if user_id.is_empty() {
            return Ok(ActionOutcome::failed("缺少用户ID"));
        }
        let force_update = event.data_bool("force_update");

        match self
            .avatars
            .analyze_and_store(&event.platform, user_id, force_update)
            .await
        {
            Ok(description) => {
                let preview: String = description.chars().take(50).collect();
                Ok(ActionOutcome::success(format!("头像分析完成: {}...", preview)))
            }
            Err(e) => Ok(ActionOutcome::failed(format!("头像分析失败: {}", e))),
        }
    }
}
