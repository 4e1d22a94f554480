//! 视觉模型层：抽象与实现（OpenAI 兼容 / Mock）

pub mod mock;
pub mod openai;
pub mod traits;

pub use mock::MockVisionModel;
pub use openai::{to_data_url, OpenAiVisionClient};
pub use traits::VisionModel;
