//! 表情包管理器：持有当前目录快照与生成后端
//!
//! 由组合根显式创建一次，以 Arc 共享给命令与 Action。目录加载失败不会让宿主退出，
//! 只是之后的查询返回 CatalogUnavailable。

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::core::MemeError;

use super::backend::MemeBackend;
use super::catalog::{MemeCatalog, MemeEntry};
use super::trigger;

/// 生成结果：图片字节与嗅探出的 MIME
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageArtifact {
    pub bytes: Vec<u8>,
    pub mime: &'static str,
}

impl ImageArtifact {
    pub fn new(bytes: Vec<u8>) -> Self {
        let mime = sniff_mime(&bytes);
        Self { bytes, mime }
    }
}

fn sniff_mime(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(b"\x89PNG") {
        "image/png"
    } else if bytes.starts_with(b"GIF8") {
        "image/gif"
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        "image/jpeg"
    } else {
        "application/octet-stream"
    }
}

/// 文字槽位宽松规整：不足 min_texts 补空串，超过 max_texts 截断
pub fn normalize_texts(entry: &MemeEntry, texts: &[String]) -> Vec<String> {
    let mut out: Vec<String> = texts.iter().take(entry.max_texts).cloned().collect();
    while out.len() < entry.min_texts {
        out.push(String::new());
    }
    out
}

pub struct MemeManager {
    backend: Arc<dyn MemeBackend>,
    catalog: RwLock<Option<Arc<MemeCatalog>>>,
}

impl MemeManager {
    /// 创建管理器（尚未加载目录）
    pub fn new(backend: Arc<dyn MemeBackend>) -> Self {
        Self {
            backend,
            catalog: RwLock::new(None),
        }
    }

    /// 从后端加载并整体替换目录，返回表情包数量；失败时保留旧目录
    pub async fn reload(&self) -> Result<usize, MemeError> {
        let infos = self.backend.load_memes().await.map_err(|e| match e {
            MemeError::CatalogUnavailable(_) => e,
            other => MemeError::CatalogUnavailable(other.to_string()),
        })?;
        let catalog = Arc::new(MemeCatalog::new(infos));
        let count = catalog.len();
        *self.catalog.write().await = Some(catalog);
        tracing::info!(count, "meme catalog loaded");
        Ok(count)
    }

    pub async fn is_initialized(&self) -> bool {
        self.catalog.read().await.is_some()
    }

    /// 当前目录快照
    pub async fn catalog(&self) -> Result<Arc<MemeCatalog>, MemeError> {
        self.catalog
            .read()
            .await
            .clone()
            .ok_or_else(|| MemeError::CatalogUnavailable("catalog not loaded".to_string()))
    }

    pub async fn find_meme(&self, name: &str) -> Result<MemeEntry, MemeError> {
        let catalog = self.catalog().await?;
        catalog.find_by_name(name).cloned()
    }

    pub async fn list_memes(&self) -> Result<Vec<MemeEntry>, MemeError> {
        Ok(self.catalog().await?.list_memes().to_vec())
    }

    /// 从只需文字的表情包里随机选一个
    pub async fn random_meme(&self) -> Result<Option<MemeEntry>, MemeError> {
        let catalog = self.catalog().await?;
        let candidates: Vec<MemeEntry> = catalog
            .list_memes()
            .iter()
            .filter(|e| e.is_text_only())
            .cloned()
            .collect();
        Ok(trigger::pick_meme(&candidates).cloned())
    }

    /// 渲染表情包；需要图片的表情包直接失败，后端任何失败都转为 GenerationFailed
    pub async fn generate(
        &self,
        entry: &MemeEntry,
        texts: &[String],
    ) -> Result<ImageArtifact, MemeError> {
        if !entry.is_text_only() {
            return Err(MemeError::GenerationFailed {
                name: entry.name.clone(),
                reason: format!("requires {} image(s)", entry.min_images),
            });
        }

        let texts = normalize_texts(entry, texts);
        let bytes = self
            .backend
            .render(&entry.key, &texts)
            .await
            .map_err(|e| {
                tracing::error!(meme = %entry.key, error = %e, "meme generation failed");
                MemeError::GenerationFailed {
                    name: entry.name.clone(),
                    reason: e.to_string(),
                }
            })?;

        if bytes.is_empty() {
            return Err(MemeError::GenerationFailed {
                name: entry.name.clone(),
                reason: "empty image".to_string(),
            });
        }

        Ok(ImageArtifact::new(bytes))
    }
}
