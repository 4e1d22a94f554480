//! 宿主框架接缝：消息发送、Person 身份解析、事件
//!
//! 插件不关心宿主如何投递消息或维护 Person 表，只通过这里的 trait 消费它们。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::meme::ImageArtifact;

/// 平台身份：(platform, user_id)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlatformIdentity {
    pub platform: String,
    pub user_id: String,
}

impl PlatformIdentity {
    pub fn new(platform: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            platform: platform.into(),
            user_id: user_id.into(),
        }
    }
}

/// 宿主的 Person 身份解析
#[async_trait]
pub trait PersonResolver: Send + Sync {
    /// person_id 绑定的全部平台身份；未绑定时为空
    async fn identities(&self, person_id: &str) -> Vec<PlatformIdentity>;

    /// 平台身份对应的 person_id
    async fn person_id(&self, platform: &str, user_id: &str) -> Option<String>;
}

/// 宿主的消息发送 API
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send_text(&self, chat_id: &str, text: &str) -> Result<(), String>;

    async fn send_image(&self, chat_id: &str, image: &ImageArtifact) -> Result<(), String>;
}

/// 一条收到的聊天消息（命令分发入口）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEvent {
    pub platform: String,
    pub chat_id: String,
    pub user_id: String,
    pub text: String,
}

impl MessageEvent {
    pub fn new(
        platform: impl Into<String>,
        chat_id: impl Into<String>,
        user_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            platform: platform.into(),
            chat_id: chat_id.into(),
            user_id: user_id.into(),
            text: text.into(),
        }
    }
}

/// 一个对话轮次的 Action 事件；requested 为宿主 AI 层显式指定的 Action 名
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionEvent {
    pub platform: String,
    pub chat_id: String,
    pub user_id: String,
    #[serde(default)]
    pub requested: Option<String>,
    #[serde(default)]
    pub action_data: Value,
}

impl ActionEvent {
    pub fn new(
        platform: impl Into<String>,
        chat_id: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            platform: platform.into(),
            chat_id: chat_id.into(),
            user_id: user_id.into(),
            requested: None,
            action_data: Value::Null,
        }
    }

    pub fn requesting(mut self, action: impl Into<String>) -> Self {
        self.requested = Some(action.into());
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.action_data = data;
        self
    }

    pub fn is_requested(&self, action: &str) -> bool {
        self.requested.as_deref() == Some(action)
    }

    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.action_data
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
    }

    pub fn data_bool(&self, key: &str) -> bool {
        self.action_data
            .get(key)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// 字符串或字符串数组都接受；其他标量转字符串
    pub fn data_texts(&self, key: &str) -> Vec<String> {
        match self.action_data.get(key) {
            Some(Value::Array(items)) => items
                .iter()
                .map(|v| match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect(),
            Some(Value::String(s)) if !s.is_empty() => vec![s.clone()],
            Some(Value::Null) | None => Vec::new(),
            Some(Value::String(_)) => Vec::new(),
            Some(other) => vec![other.to_string()],
        }
    }
}
