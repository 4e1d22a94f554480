//! OpenAI 兼容视觉模型客户端
//!
//! 通过 async_openai 调用任意 OpenAI 兼容端点（可配置 base_url）；图片以 base64 data URL 随用户消息发送。

use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionRequestMessage, ChatCompletionRequestMessageContentPartImageArgs,
    ChatCompletionRequestMessageContentPartTextArgs, ChatCompletionRequestUserMessageArgs,
    ChatCompletionRequestUserMessageContentPart, CreateChatCompletionRequestArgs, ImageUrlArgs,
};
use async_openai::Client;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use crate::config::VisionSection;
use crate::llm::VisionModel;

/// 图片字节转 data URL
pub fn to_data_url(image: &[u8], mime: &str) -> String {
    format!("data:{};base64,{}", mime, BASE64.encode(image))
}

/// OpenAI 兼容视觉客户端：持有 Client 与 model 名，describe 时取首条 content
pub struct OpenAiVisionClient {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiVisionClient {
    pub fn new(base_url: Option<&str>, model: &str, api_key: Option<&str>) -> Self {
        let api_key = api_key
            .map(String::from)
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .unwrap_or_else(|| "sk-placeholder".to_string());

        let config = if let Some(url) = base_url {
            OpenAIConfig::new().with_api_base(url).with_api_key(api_key)
        } else {
            OpenAIConfig::new().with_api_key(api_key)
        };

        Self {
            client: Client::with_config(config),
            model: model.to_string(),
        }
    }

    pub fn from_config(section: &VisionSection) -> Self {
        Self::new(
            section.base_url.as_deref(),
            &section.model,
            section.api_key.as_deref(),
        )
    }

    fn build_message(
        prompt: &str,
        image: &[u8],
        mime: &str,
    ) -> Result<ChatCompletionRequestMessage, String> {
        let text = ChatCompletionRequestMessageContentPartTextArgs::default()
            .text(prompt)
            .build()
            .map_err(|e| e.to_string())?;
        let image_url = ImageUrlArgs::default()
            .url(to_data_url(image, mime))
            .build()
            .map_err(|e| e.to_string())?;
        let image = ChatCompletionRequestMessageContentPartImageArgs::default()
            .image_url(image_url)
            .build()
            .map_err(|e| e.to_string())?;

        let parts = vec![
            ChatCompletionRequestUserMessageContentPart::Text(text),
            ChatCompletionRequestUserMessageContentPart::ImageUrl(image),
        ];
        let message = ChatCompletionRequestUserMessageArgs::default()
            .content(parts)
            .build()
            .map_err(|e| e.to_string())?;
        Ok(ChatCompletionRequestMessage::User(message))
    }
}

#[async_trait]
impl VisionModel for OpenAiVisionClient {
    async fn describe(&self, prompt: &str, image: &[u8], mime: &str) -> Result<String, String> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(vec![Self::build_message(prompt, image, mime)?])
            .build()
            .map_err(|e| e.to_string())?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| e.to_string())?;

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default();

        Ok(content)
    }
}
