//! Mock 视觉模型（用于测试与离线运行，无需 API）
//!
//! 返回固定描述并记录调用次数；可设为总是失败。

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::llm::VisionModel;

#[derive(Debug)]
pub struct MockVisionModel {
    reply: Result<String, String>,
    calls: AtomicUsize,
}

impl MockVisionModel {
    /// 总是返回 description
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            reply: Ok(description.into()),
            calls: AtomicUsize::new(0),
        }
    }

    /// 总是失败（模拟网络错误 / 配额耗尽）
    pub fn failing(error: impl Into<String>) -> Self {
        Self {
            reply: Err(error.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockVisionModel {
    fn default() -> Self {
        Self::new("一只戴着墨镜的橘猫，看起来很酷")
    }
}

#[async_trait]
impl VisionModel for MockVisionModel {
    async fn describe(&self, _prompt: &str, _image: &[u8], _mime: &str) -> Result<String, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply.clone()
    }
}
