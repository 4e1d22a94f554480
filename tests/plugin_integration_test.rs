//! 插件集成测试：用桩实现替代生成库、头像抓取、视觉模型与宿主，走完整的组件分发流程

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use qq_avatar_meme::avatar::{
    AvatarAnalyzer, AvatarFetcher, AvatarRepository, FetchedAvatar, SqliteAvatarStore,
};
use qq_avatar_meme::config::PluginConfig;
use qq_avatar_meme::core::{AvatarError, MemeError};
use qq_avatar_meme::host::{ActionEvent, MessageEvent, MessageSender, PersonResolver, PlatformIdentity};
use qq_avatar_meme::llm::MockVisionModel;
use qq_avatar_meme::meme::{ImageArtifact, MemeBackend, MemeInfo, MemeManager, MAX_SUGGESTIONS};
use qq_avatar_meme::plugins::{ANALYZE_AVATAR, AUTO_MEME};
use qq_avatar_meme::QqAvatarMemePlugin;
use serde_json::json;

const MARKER: &[u8] = b"\x89PNG-meme-marker";

struct StubBackend {
    infos: Vec<MemeInfo>,
    available: bool,
}

#[async_trait]
impl MemeBackend for StubBackend {
    async fn load_memes(&self) -> Result<Vec<MemeInfo>, MemeError> {
        if !self.available {
            return Err(MemeError::CatalogUnavailable("connection refused".to_string()));
        }
        Ok(self.infos.clone())
    }

    async fn render(&self, key: &str, _texts: &[String]) -> Result<Vec<u8>, MemeError> {
        if key == "broken" {
            return Err(MemeError::Backend("missing asset".to_string()));
        }
        Ok(MARKER.to_vec())
    }
}

fn sample_backend() -> StubBackend {
    StubBackend {
        infos: vec![
            MemeInfo::new("鲁迅").with_keywords(&["鲁迅说"]).with_tags(&["名人"]).with_texts(1, 1),
            MemeInfo::new("petpet").with_keywords(&["摸", "摸摸"]).with_tags(&["动作"]),
            MemeInfo::new("broken").with_keywords(&["坏掉的"]),
        ],
        available: true,
    }
}

#[derive(Default)]
struct RecordingSender {
    texts: Mutex<Vec<String>>,
    images: Mutex<Vec<ImageArtifact>>,
}

#[async_trait]
impl MessageSender for RecordingSender {
    async fn send_text(&self, _chat_id: &str, text: &str) -> Result<(), String> {
        self.texts.lock().unwrap().push(text.to_string());
        Ok(())
    }

    async fn send_image(&self, _chat_id: &str, image: &ImageArtifact) -> Result<(), String> {
        self.images.lock().unwrap().push(image.clone());
        Ok(())
    }
}

#[derive(Default)]
struct MapResolver {
    persons: HashMap<String, Vec<PlatformIdentity>>,
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
        Ok(FetchedAvatar {
            url: format!("http://avatar/{}", identity.user_id),
            bytes: vec![0xFF, 0xD8, 0xFF],
            mime: "image/jpeg".to_string(),
        })
    }
}

struct Harness {
    plugin: QqAvatarMemePlugin,
    sender: Arc<RecordingSender>,
    fetcher: Arc<CountingFetcher>,
    vision: Arc<MockVisionModel>,
    store: Arc<SqliteAvatarStore>,
}

async fn harness(config: PluginConfig, backend: StubBackend, vision: MockVisionModel) -> Harness {
    let mut resolver = MapResolver::default();
    resolver
        .persons
        .insert("p_qq".to_string(), vec![PlatformIdentity::new("qq", "10001")]);
    resolver.persons.insert("p_unbound".to_string(), Vec::new());

    let sender = Arc::new(RecordingSender::default());
    let fetcher = Arc::new(CountingFetcher::default());
    let vision = Arc::new(vision);
    let store = Arc::new(SqliteAvatarStore::in_memory().unwrap());

    let analyzer = AvatarAnalyzer::new(
        Arc::new(resolver),
        fetcher.clone(),
        vision.clone(),
        store.clone(),
        config.avatar.analysis_prompt.clone(),
    );
    let plugin =
        QqAvatarMemePlugin::new(&config, Arc::new(backend), analyzer, sender.clone()).unwrap();
    plugin.start().await;

    Harness {
        plugin,
        sender,
        fetcher,
        vision,
        store,
    }
}

fn message(text: &str) -> MessageEvent {
    MessageEvent::new("qq", "group1", "10001", text)
}

#[tokio::test]
async fn test_generate_luxun_returns_marker_image() {
    let manager = MemeManager::new(Arc::new(sample_backend()));
    manager.reload().await.unwrap();
    let entry = manager.find_meme("鲁迅").await.unwrap();
    assert_eq!(entry.min_texts, 1);

    let image = manager
        .generate(&entry, &["我没说过这句话".to_string()])
        .await
        .unwrap();
    assert!(!image.bytes.is_empty());
    assert_eq!(image.bytes, MARKER);
}

#[tokio::test]
async fn test_unknown_meme_is_lookup_failure_with_bounded_suggestions() {
    let manager = MemeManager::new(Arc::new(sample_backend()));
    manager.reload().await.unwrap();
    match manager.find_meme("不存在的表情").await {
        Err(MemeError::NotFound { suggestions, .. }) => {
            assert!(suggestions.len() <= MAX_SUGGESTIONS)
        }
        other => panic!("expected NotFound, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unbound_person_returns_none_without_network() {
    let h = harness(PluginConfig::default(), sample_backend(), MockVisionModel::default()).await;
    assert_eq!(h.plugin.head_description_for_prompt("p_unbound").await, None);
    assert_eq!(h.plugin.head_description_for_prompt("p_missing").await, None);
    assert_eq!(h.fetcher.calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.vision.calls(), 0);
}

#[tokio::test]
async fn test_vision_failure_returns_none_and_writes_nothing() {
    let h = harness(
        PluginConfig::default(),
        sample_backend(),
        MockVisionModel::failing("quota exceeded"),
    )
    .await;
    assert_eq!(h.plugin.head_description_for_prompt("p_qq").await, None);
    assert_eq!(h.fetcher.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_description_cached_after_first_analysis() {
    let h = harness(PluginConfig::default(), sample_backend(), MockVisionModel::new("戴帽子的少女")).await;
    let first = h.plugin.head_description_for_prompt("p_qq").await;
    let second = h.plugin.head_description_for_prompt("p_qq").await;
    assert_eq!(first.as_deref(), Some("戴帽子的少女"));
    assert_eq!(first, second);
    assert_eq!(h.vision.calls(), 1);

    let row = h.store.get("qq", "10001").await.unwrap().unwrap();
    assert_eq!(row.person_id, "p_qq");
    assert_eq!(row.avatar_url.as_deref(), Some("http://avatar/10001"));
}

#[tokio::test]
async fn test_menu_command() {
    let h = harness(PluginConfig::default(), sample_backend(), MockVisionModel::default()).await;
    let outcome = h.plugin.registry().handle_message(&message("/menu")).await.unwrap();
    assert!(outcome.success);

    let texts = h.sender.texts.lock().unwrap();
    assert!(texts[0].starts_with("表情包菜单"));
    assert!(texts[0].contains("[名人]"));
    assert!(texts[0].ends_with("共3个可用"));
}

#[tokio::test]
async fn test_meme_command_sends_image() {
    let h = harness(PluginConfig::default(), sample_backend(), MockVisionModel::default()).await;
    let outcome = h
        .plugin
        .registry()
        .handle_message(&message("/meme 鲁迅说 我没说过这句话"))
        .await
        .unwrap();
    assert!(outcome.success);
    assert_eq!(h.sender.images.lock().unwrap().len(), 1);
    assert!(h.sender.texts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_meme_command_replies_hint_and_apology() {
    let h = harness(PluginConfig::default(), sample_backend(), MockVisionModel::default()).await;
    let registry = h.plugin.registry();

    let outcome = registry.handle_message(&message("/meme 摸摸头")).await.unwrap();
    assert!(!outcome.success);
    let outcome = registry.handle_message(&message("/meme 坏掉的")).await.unwrap();
    assert!(!outcome.success);

    let texts = h.sender.texts.lock().unwrap();
    assert!(texts[0].starts_with("未找到表情包: 摸摸头"));
    assert!(texts[0].contains("你是不是想找"));
    assert!(texts[0].ends_with("使用 /menu 查看可用表情包"));
    assert_eq!(texts[1], "生成失败");
    assert!(h.sender.images.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_catalog_unavailable_is_not_fatal() {
    let backend = StubBackend {
        infos: Vec::new(),
        available: false,
    };
    let h = harness(PluginConfig::default(), backend, MockVisionModel::default()).await;
    assert!(!h.plugin.memes().is_initialized().await);

    let outcome = h.plugin.registry().handle_message(&message("/meme 鲁迅 hi")).await.unwrap();
    assert!(!outcome.success);
    assert_eq!(h.sender.texts.lock().unwrap()[0], "表情包功能未启用");
}

#[tokio::test]
async fn test_plain_message_is_not_a_command() {
    let h = harness(PluginConfig::default(), sample_backend(), MockVisionModel::default()).await;
    assert!(h.plugin.registry().handle_message(&message("今天天气不错")).await.is_none());
    assert!(h.plugin.registry().handle_message(&message("/meme")).await.is_none());
}

#[tokio::test]
async fn test_auto_meme_action_requested_and_random() {
    let mut config = PluginConfig::default();
    config.meme.trigger_probability = 1.0;
    let h = harness(config, sample_backend(), MockVisionModel::default()).await;
    let registry = h.plugin.registry();

    let event = ActionEvent::new("qq", "group1", "10001")
        .requesting(AUTO_MEME)
        .with_data(json!({"meme_key": "鲁迅说", "texts": "我没说过这句话"}));
    let (name, outcome) = registry.handle_turn(&event).await.unwrap();
    assert_eq!(name, AUTO_MEME);
    assert!(outcome.success, "{}", outcome.message);

    let (name, _) = registry
        .handle_turn(&ActionEvent::new("qq", "group1", "10001"))
        .await
        .unwrap();
    assert_eq!(name, AUTO_MEME);
    assert!(!h.sender.images.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_auto_meme_never_fires_at_zero_probability() {
    let mut config = PluginConfig::default();
    config.meme.trigger_probability = 0.0;
    let h = harness(config, sample_backend(), MockVisionModel::default()).await;
    for _ in 0..100 {
        assert!(h
            .plugin
            .registry()
            .handle_turn(&ActionEvent::new("qq", "group1", "10001"))
            .await
            .is_none());
    }
}

#[tokio::test]
async fn test_analyze_avatar_action() {
    let h = harness(PluginConfig::default(), sample_backend(), MockVisionModel::new("蓝色背景的猫")).await;
    let event = ActionEvent::new("qq", "group1", "10001").requesting(ANALYZE_AVATAR);
    let (name, outcome) = h.plugin.registry().handle_turn(&event).await.unwrap();
    assert_eq!(name, ANALYZE_AVATAR);
    assert!(outcome.success);
    assert!(outcome.message.starts_with("头像分析完成: 蓝色背景的猫"));
    assert_eq!(h.store.count().await.unwrap(), 1);

    let event = ActionEvent::new("qq", "group1", "10001")
        .requesting(ANALYZE_AVATAR)
        .with_data(json!({"user_id": "99999"}));
    let (_, outcome) = h.plugin.registry().handle_turn(&event).await.unwrap();
    assert!(!outcome.success);
}

#[tokio::test]
async fn test_config_toggles_control_registration() {
    let mut config = PluginConfig::default();
    config.meme.enable_command_mode = false;
    config.avatar.enable_analysis = false;
    let h = harness(config, sample_backend(), MockVisionModel::default()).await;
    assert!(h.plugin.registry().command_names().is_empty());
    assert_eq!(h.plugin.registry().action_names(), vec![AUTO_MEME.to_string()]);
    assert!(h.plugin.registry().handle_message(&message("/menu")).await.is_none());

    let mut config = PluginConfig::default();
    config.plugin.enabled = false;
    let h = harness(config, sample_backend(), MockVisionModel::default()).await;
    assert!(h.plugin.registry().command_names().is_empty());
    assert!(h.plugin.registry().action_names().is_empty());
}

#[tokio::test]
async fn test_invalid_probability_rejected() {
    let mut config = PluginConfig::default();
    config.meme.trigger_probability = 1.5;
    let analyzer = AvatarAnalyzer::new(
        Arc::new(MapResolver::default()),
        Arc::new(CountingFetcher::default()),
        Arc::new(MockVisionModel::default()),
        Arc::new(SqliteAvatarStore::in_memory().unwrap()),
        "prompt",
    );
    let result = QqAvatarMemePlugin::new(
        &config,
        Arc::new(sample_backend()),
        analyzer,
        Arc::new(RecordingSender::default()),
    );
    assert!(result.is_err());
}

#[tokio::test]
async fn test_shared_name_replies_hint_with_both_memes() {
    let backend = StubBackend {
        infos: vec![
            MemeInfo::new("petpet").with_keywords(&["摸头", "摸"]),
            MemeInfo::new("rub").with_keywords(&["摸摸", "摸"]),
        ],
        available: true,
    };
    let h = harness(PluginConfig::default(), backend, MockVisionModel::default()).await;
    let outcome = h.plugin.registry().handle_message(&message("/meme 摸 你好")).await.unwrap();
    assert!(!outcome.success);
    assert!(h.sender.images.lock().unwrap().is_empty());

    let texts = h.sender.texts.lock().unwrap();
    assert!(texts[0].starts_with("未找到表情包: 摸"));
    assert!(texts[0].contains("你是不是想找: 摸头、摸摸"));
}
