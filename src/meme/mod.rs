//! 表情包：生成后端、目录、管理器（查找 + 生成）、随机触发

pub mod backend;
pub mod catalog;
pub mod manager;
pub mod trigger;

pub use backend::{HttpMemeBackend, MemeBackend, MemeInfo};
pub use catalog::{MemeCatalog, MemeEntry, DEFAULT_CATEGORY, MAX_SUGGESTIONS};
pub use manager::{normalize_texts, ImageArtifact, MemeManager};
pub use trigger::{pick_meme, should_trigger, DEFAULT_TRIGGER_PROBABILITY};
