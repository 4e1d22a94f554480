//! 视觉模型抽象
//!
//! 所有后端（OpenAI 兼容 / Mock）实现 VisionModel：图片字节 + 提示词 -> 文本描述。

use async_trait::async_trait;

/// 视觉模型 trait
#[async_trait]
pub trait VisionModel: Send + Sync {
    /// 描述一张图片；image 为原始字节，mime 如 image/jpeg
    async fn describe(&self, prompt: &str, image: &[u8], mime: &str) -> Result<String, String>;
}
