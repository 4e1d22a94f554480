//! 表情包生成后端
//!
//! MemeBackend 是外部表情包生成库的接缝：列出表情包元信息、按 key 渲染。
//! HttpMemeBackend 对接 meme-generator 的 HTTP 服务（`GET /memes/keys`、`GET /memes/{key}/info`、
//! `POST /memes/{key}/`），渲染结果为图片字节。

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::MemeBackendSection;
use crate::core::MemeError;

/// 生成库给出的单个表情包元信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemeInfo {
    pub key: String,
    pub keywords: Vec<String>,
    pub tags: Vec<String>,
    pub min_texts: usize,
    pub max_texts: usize,
    pub min_images: usize,
}

impl MemeInfo {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            keywords: Vec::new(),
            tags: Vec::new(),
            min_texts: 0,
            max_texts: 0,
            min_images: 0,
        }
    }

    pub fn with_keywords(mut self, keywords: &[&str]) -> Self {
        self.keywords = keywords.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|s| s.to_string()).collect();
        self
    }

    /// 文字槽位：至少 min 个，最多 max 个
    pub fn with_texts(mut self, min: usize, max: usize) -> Self {
        self.min_texts = min;
        self.max_texts = max.max(min);
        self
    }

    /// 至少需要的图片数（头像等）
    pub fn with_images(mut self, min: usize) -> Self {
        self.min_images = min;
        self
    }
}

/// 外部表情包生成库
#[async_trait]
pub trait MemeBackend: Send + Sync {
    /// 加载全部表情包元信息
    async fn load_memes(&self) -> Result<Vec<MemeInfo>, MemeError>;

    /// 渲染指定表情包，texts 已按槽位规整
    async fn render(&self, key: &str, texts: &[String]) -> Result<Vec<u8>, MemeError>;
}

#[derive(Debug, Deserialize)]
struct InfoResponse {
    key: String,
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    tags: Vec<String>,
    params_type: ParamsType,
}

#[derive(Debug, Deserialize)]
struct ParamsType {
    #[serde(default)]
    min_images: usize,
    #[serde(default)]
    min_texts: usize,
    #[serde(default)]
    max_texts: usize,
}

impl From<InfoResponse> for MemeInfo {
    fn from(r: InfoResponse) -> Self {
        Self {
            key: r.key,
            keywords: r.keywords,
            tags: r.tags,
            min_texts: r.params_type.min_texts,
            max_texts: r.params_type.max_texts.max(r.params_type.min_texts),
            min_images: r.params_type.min_images,
        }
    }
}

/// meme-generator HTTP 服务客户端
pub struct HttpMemeBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpMemeBackend {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, MemeError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| MemeError::Backend(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(section: &MemeBackendSection) -> Result<Self, MemeError> {
        Self::new(&section.base_url, section.timeout_secs)
    }

    async fn fetch_info(&self, key: &str) -> Result<MemeInfo, MemeError> {
        let url = format!("{}/memes/{}/info", self.base_url, key);
        let info: InfoResponse = self
            .client
            .get(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| MemeError::Backend(e.to_string()))?
            .json()
            .await
            .map_err(|e| MemeError::Backend(e.to_string()))?;
        Ok(info.into())
    }
}

#[async_trait]
impl MemeBackend for HttpMemeBackend {
    async fn load_memes(&self) -> Result<Vec<MemeInfo>, MemeError> {
        let url = format!("{}/memes/keys", self.base_url);
        let keys: Vec<String> = self
            .client
            .get(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| MemeError::CatalogUnavailable(e.to_string()))?
            .json()
            .await
            .map_err(|e| MemeError::CatalogUnavailable(e.to_string()))?;

        let mut infos = Vec::with_capacity(keys.len());
        for key in keys {
            match self.fetch_info(&key).await {
                Ok(info) => infos.push(info),
                Err(e) => tracing::warn!(meme = %key, error = %e, "skip meme without info"),
            }
        }
        Ok(infos)
    }

    async fn render(&self, key: &str, texts: &[String]) -> Result<Vec<u8>, MemeError> {
        let url = format!("{}/memes/{}/", self.base_url, key);
        let mut form = reqwest::multipart::Form::new().text("args", "{}");
        for text in texts {
            form = form.text("texts", text.clone());
        }

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| MemeError::Backend(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MemeError::Backend(format!("HTTP {}: {}", status, body.trim())));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| MemeError::Backend(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}
