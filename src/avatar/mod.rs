//! 头像印象：抓取、视觉分析、描述缓存与对外门面

pub mod analyzer;
pub mod facade;
pub mod fetcher;
pub mod store;

pub use analyzer::AvatarAnalyzer;
pub use facade::{format_head_description_for_relation, get_head_description_for_prompt};
pub use fetcher::{qq_avatar_url, AvatarFetcher, FetchedAvatar, QqAvatarFetcher, QQ_PLATFORM};
pub use store::{AvatarDescription, AvatarRepository, SqliteAvatarStore};
