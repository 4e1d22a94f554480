//! 头像抓取
//!
//! 目前只支持 QQ：通过 q.qlogo.cn 下载 640 尺寸 JPEG。其他平台直接返回 PlatformUnsupported，不发请求。

use std::time::Duration;

use async_trait::async_trait;

use crate::core::AvatarError;
use crate::host::PlatformIdentity;

pub const QQ_PLATFORM: &str = "qq";

/// 抓到的头像：来源 URL + 图片字节
#[derive(Debug, Clone)]
pub struct FetchedAvatar {
    pub url: String,
    pub bytes: Vec<u8>,
    pub mime: String,
}

#[async_trait]
pub trait AvatarFetcher: Send + Sync {
    async fn fetch(&self, identity: &PlatformIdentity) -> Result<FetchedAvatar, AvatarError>;
}

/// QQ 头像地址
pub fn qq_avatar_url(user_id: &str) -> String {
    format!(
        "http://q.qlogo.cn/headimg_dl?dst_uin={}&spec=640&img_type=jpg",
        user_id
    )
}

pub struct QqAvatarFetcher {
    client: reqwest::Client,
}

impl QqAvatarFetcher {
    pub fn new(timeout_secs: u64) -> Result<Self, AvatarError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| AvatarError::FetchFailed(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl AvatarFetcher for QqAvatarFetcher {
    async fn fetch(&self, identity: &PlatformIdentity) -> Result<FetchedAvatar, AvatarError> {
        if identity.platform != QQ_PLATFORM {
            return Err(AvatarError::PlatformUnsupported(identity.platform.clone()));
        }
        if identity.user_id.is_empty() || !identity.user_id.chars().all(|c| c.is_ascii_digit()) {
            return Err(AvatarError::FetchFailed(format!(
                "invalid qq number: {}",
                identity.user_id
            )));
        }

        let url = qq_avatar_url(&identity.user_id);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AvatarError::FetchFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AvatarError::FetchFailed(format!("HTTP {}", status)));
        }

        let mime = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .filter(|v| v.starts_with("image/"))
            .unwrap_or("image/jpeg")
            .to_string();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AvatarError::FetchFailed(e.to_string()))?;
        if bytes.is_empty() {
            return Err(AvatarError::FetchFailed("empty avatar".to_string()));
        }

        Ok(FetchedAvatar {
            url,
            bytes: bytes.to_vec(),
            mime,
        })
    }
}
