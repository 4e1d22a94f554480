//! 头像描述缓存 / 分析器
//!
//! 命中缓存直接返回，不做新鲜度检查；未命中时抓头像、交给视觉模型、写库后返回。
//! get_description 永不报错：任何失败都记日志并返回 None，保证 prompt 构建不被打断。

use std::sync::Arc;

use chrono::Utc;

use crate::core::AvatarError;
use crate::host::{PersonResolver, PlatformIdentity};
use crate::llm::VisionModel;

use super::fetcher::{AvatarFetcher, QQ_PLATFORM};
use super::store::{AvatarDescription, AvatarRepository};

pub struct AvatarAnalyzer {
    resolver: Arc<dyn PersonResolver>,
    fetcher: Arc<dyn AvatarFetcher>,
    vision: Arc<dyn VisionModel>,
    repo: Arc<dyn AvatarRepository>,
    prompt: String,
    analysis_enabled: bool,
}

impl AvatarAnalyzer {
    pub fn new(
        resolver: Arc<dyn PersonResolver>,
        fetcher: Arc<dyn AvatarFetcher>,
        vision: Arc<dyn VisionModel>,
        repo: Arc<dyn AvatarRepository>,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            resolver,
            fetcher,
            vision,
            repo,
            prompt: prompt.into(),
            analysis_enabled: true,
        }
    }

    /// 关闭后未命中缓存时不再抓取分析，已缓存的描述照常返回
    pub fn with_analysis_enabled(mut self, enabled: bool) -> Self {
        self.analysis_enabled = enabled;
        self
    }

    pub fn repository(&self) -> &Arc<dyn AvatarRepository> {
        &self.repo
    }

    /// person_id -> 头像描述；未绑定身份、平台不支持、分析失败都返回 None
    pub async fn get_description(&self, person_id: &str) -> Option<String> {
        let identities = self.resolver.identities(person_id).await;
        if identities.is_empty() {
            tracing::debug!(person_id = %person_id, "person has no platform identity");
            return None;
        }

        match self.cached(&identities).await {
            Ok(Some(record)) => {
                tracing::debug!(person_id = %person_id, "avatar description cache hit");
                return Some(record.head_description);
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(person_id = %person_id, kind = e.kind(), error = %e, "avatar cache lookup failed");
                return None;
            }
        }

        if !self.analysis_enabled {
            return None;
        }

        let identity = identities
            .iter()
            .find(|i| i.platform == QQ_PLATFORM)
            .unwrap_or(&identities[0]);

        match self.analyze(person_id, identity).await {
            Ok(description) => Some(description),
            Err(e) => {
                log_failure(person_id, identity, &e);
                None
            }
        }
    }

    /// 分析指定用户的头像并写库；force_update 为 false 且已有记录时直接返回已有描述
    pub async fn analyze_and_store(
        &self,
        platform: &str,
        user_id: &str,
        force_update: bool,
    ) -> Result<String, AvatarError> {
        let person_id = self
            .resolver
            .person_id(platform, user_id)
            .await
            .ok_or(AvatarError::PersonNotFound)?;

        if !force_update {
            if let Some(existing) = self.repo.get(platform, user_id).await? {
                tracing::info!(user_id = %user_id, "avatar already described, skip analysis");
                return Ok(existing.head_description);
            }
        }

        let identity = PlatformIdentity::new(platform, user_id);
        self.analyze(&person_id, &identity).await.map_err(|e| {
            log_failure(&person_id, &identity, &e);
            e
        })
    }

    /// 多个身份都有记录时取最近一次分析的
    async fn cached(
        &self,
        identities: &[PlatformIdentity],
    ) -> Result<Option<AvatarDescription>, AvatarError> {
        let mut latest: Option<AvatarDescription> = None;
        for identity in identities {
            if let Some(record) = self.repo.get(&identity.platform, &identity.user_id).await? {
                if latest
                    .as_ref()
                    .map_or(true, |l| record.analyzed_at > l.analyzed_at)
                {
                    latest = Some(record);
                }
            }
        }
        Ok(latest)
    }

    async fn analyze(
        &self,
        person_id: &str,
        identity: &PlatformIdentity,
    ) -> Result<String, AvatarError> {
        let avatar = self.fetcher.fetch(identity).await?;

        let description = self
            .vision
            .describe(&self.prompt, &avatar.bytes, &avatar.mime)
            .await
            .map_err(AvatarError::AnalysisFailed)?
            .trim()
            .to_string();
        if description.is_empty() {
            return Err(AvatarError::AnalysisFailed("empty response".to_string()));
        }

        let record = AvatarDescription {
            person_id: person_id.to_string(),
            platform: identity.platform.clone(),
            user_id: identity.user_id.clone(),
            head_description: description.clone(),
            avatar_url: Some(avatar.url),
            analyzed_at: Utc::now(),
        };
        self.repo.upsert(&record).await?;

        let preview: String = description.chars().take(30).collect();
        tracing::info!(user_id = %identity.user_id, description = %preview, "avatar analysis done");
        Ok(description)
    }
}

fn log_failure(person_id: &str, identity: &PlatformIdentity, e: &AvatarError) {
    match e {
        AvatarError::PlatformUnsupported(_) => tracing::debug!(
            person_id = %person_id,
            platform = %identity.platform,
            "avatar fetch skipped: platform unsupported"
        ),
        _ => tracing::warn!(
            person_id = %person_id,
            user_id = %identity.user_id,
            kind = e.kind(),
            error = %e,
            "avatar analysis failed"
        ),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::avatar::fetcher::FetchedAvatar;
    use crate::avatar::store::SqliteAvatarStore;
    use crate::llm::MockVisionModel;

    #[derive(Default)]
    struct MapResolver {
        persons: HashMap<String, Vec<PlatformIdentity>>,
    }

    impl MapResolver {
        fn with(mut self, person_id: &str, platform: &str, user_id: &str) -> Self {
            self.persons
                .entry(person_id.to_string())
                .or_default()
                .push(PlatformIdentity::new(platform, user_id));
            self
        }
    }

    #[async_trait]
    impl PersonResolver for MapResolver {
        async fn identities(&self, person_id: &str) -> Vec<PlatformIdentity> {
            self.persons.get(person_id).cloned().unwrap_or_default()
        }

        async fn person_id(&self, platform: &str, user_id: &str) -> Option<String> {
            self.persons
                .iter()
                .find(|(_, ids)| ids.iter().any(|i| i.platform == platform && i.user_id == user_id))
                .map(|(p, _)| p.clone())
        }
    }

    #[derive(Default)]
    struct CountingFetcher {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl AvatarFetcher for CountingFetcher {
        async fn fetch(&self, identity: &PlatformIdentity) -> Result<FetchedAvatar, AvatarError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if identity.platform != QQ_PLATFORM {
                return Err(AvatarError::PlatformUnsupported(identity.platform.clone()));
            }
            Ok(FetchedAvatar {
                url: format!("http://avatar/{}", identity.user_id),
                bytes: vec![0xFF, 0xD8, 0xFF],
                mime: "image/jpeg".to_string(),
            })
        }
    }

    fn analyzer(
        resolver: MapResolver,
        fetcher: Arc<CountingFetcher>,
        vision: Arc<MockVisionModel>,
    ) -> AvatarAnalyzer {
        AvatarAnalyzer::new(
            Arc::new(resolver),
            fetcher,
            vision,
            Arc::new(SqliteAvatarStore::in_memory().unwrap()),
            "描述头像",
        )
    }

    #[tokio::test]
    async fn test_second_call_hits_cache() {
        let fetcher = Arc::new(CountingFetcher::default());
        let vision = Arc::new(MockVisionModel::new("  一只猫  "));
        let a = analyzer(
            MapResolver::default().with("p1", "qq", "10001"),
            fetcher.clone(),
            vision.clone(),
        );

        let first = a.get_description("p1").await;
        let second = a.get_description("p1").await;
        assert_eq!(first.as_deref(), Some("一只猫"));
        assert_eq!(first, second);
        assert_eq!(vision.calls(), 1);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unsupported_platform_returns_none_without_vision_call() {
        let fetcher = Arc::new(CountingFetcher::default());
        let vision = Arc::new(MockVisionModel::default());
        let a = analyzer(
            MapResolver::default().with("p1", "discord", "42"),
            fetcher,
            vision.clone(),
        );

        assert_eq!(a.get_description("p1").await, None);
        assert_eq!(vision.calls(), 0);
        assert_eq!(a.repository().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_analysis_disabled_serves_cache_only() {
        let fetcher = Arc::new(CountingFetcher::default());
        let vision = Arc::new(MockVisionModel::default());
        let a = analyzer(
            MapResolver::default().with("p1", "qq", "10001"),
            fetcher.clone(),
            vision,
        )
        .with_analysis_enabled(false);

        assert_eq!(a.get_description("p1").await, None);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);

        a.repository()
            .upsert(&AvatarDescription {
                person_id: "p1".to_string(),
                platform: "qq".to_string(),
                user_id: "10001".to_string(),
                head_description: "手动写入".to_string(),
                avatar_url: None,
                analyzed_at: Utc::now(),
            })
            .await
            .unwrap();
        assert_eq!(a.get_description("p1").await.as_deref(), Some("手动写入"));
    }

    #[tokio::test]
    async fn test_multiple_identities_latest_wins() {
        let fetcher = Arc::new(CountingFetcher::default());
        let vision = Arc::new(MockVisionModel::default());
        let a = analyzer(
            MapResolver::default()
                .with("p1", "qq", "10001")
                .with("p1", "qq", "10002"),
            fetcher,
            vision,
        );
        let now = Utc::now();
        for (user_id, text, offset) in [("10001", "新", 60), ("10002", "旧", 0)] {
            a.repository()
                .upsert(&AvatarDescription {
                    person_id: "p1".to_string(),
                    platform: "qq".to_string(),
                    user_id: user_id.to_string(),
                    head_description: text.to_string(),
                    avatar_url: None,
                    analyzed_at: now + chrono::Duration::seconds(offset),
                })
                .await
                .unwrap();
        }
        assert_eq!(a.get_description("p1").await.as_deref(), Some("新"));
    }

    #[tokio::test]
    async fn test_analyze_and_store_force_update_overwrites() {
        let fetcher = Arc::new(CountingFetcher::default());
        let vision = Arc::new(MockVisionModel::new("第一次"));
        let a = analyzer(
            MapResolver::default().with("p1", "qq", "10001"),
            fetcher.clone(),
            vision.clone(),
        );

        assert_eq!(a.analyze_and_store("qq", "10001", false).await.unwrap(), "第一次");
        assert_eq!(a.analyze_and_store("qq", "10001", false).await.unwrap(), "第一次");
        assert_eq!(vision.calls(), 1);

        a.analyze_and_store("qq", "10001", true).await.unwrap();
        assert_eq!(vision.calls(), 2);
        assert_eq!(a.repository().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_analyze_and_store_unknown_person() {
        let a = analyzer(
            MapResolver::default(),
            Arc::new(CountingFetcher::default()),
            Arc::new(MockVisionModel::default()),
        );
        let err = a.analyze_and_store("qq", "999", false).await.unwrap_err();
        assert!(matches!(err, AvatarError::PersonNotFound));
    }
}
