//! qq-avatar-meme 控制台宿主
//!
//! 入口：初始化日志、加载配置、组装插件，然后把标准输入的每一行当作一条聊天消息分发。
//! - 普通消息先走命令匹配，未命中则作为一个对话轮次咨询 Action
//! - `/avatar <person_id>` 查询头像印象（person_id 形如 `qq:10001`）
//! - `/act <action> [json]` 显式请求一个 Action

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use qq_avatar_meme::avatar::{AvatarAnalyzer, QqAvatarFetcher, SqliteAvatarStore};
use qq_avatar_meme::config::load_config;
use qq_avatar_meme::host::{ActionEvent, MessageEvent, MessageSender, PersonResolver, PlatformIdentity};
use qq_avatar_meme::llm::{MockVisionModel, OpenAiVisionClient, VisionModel};
use qq_avatar_meme::meme::{HttpMemeBackend, ImageArtifact};
use qq_avatar_meme::{format_head_description_for_relation, observability, QqAvatarMemePlugin};
use tokio::io::{AsyncBufReadExt, BufReader};

const CONSOLE_PLATFORM: &str = "qq";
const CONSOLE_CHAT: &str = "console";
const CONSOLE_USER: &str = "10000";

/// person_id 即 `platform:user_id`
struct ConsolePersonResolver;

#[async_trait]
impl PersonResolver for ConsolePersonResolver {
    async fn identities(&self, person_id: &str) -> Vec<PlatformIdentity> {
        match person_id.split_once(':') {
            Some((platform, user_id)) if !platform.is_empty() && !user_id.is_empty() => {
                vec![PlatformIdentity::new(platform, user_id)]
            }
            _ => Vec::new(),
        }
    }

    async fn person_id(&self, platform: &str, user_id: &str) -> Option<String> {
        Some(format!("{}:{}", platform, user_id))
    }
}

/// 文本打印到标准输出，图片写入 workspace 目录
struct ConsoleSender {
    out_dir: PathBuf,
    counter: AtomicUsize,
}

#[async_trait]
impl MessageSender for ConsoleSender {
    async fn send_text(&self, chat_id: &str, text: &str) -> Result<(), String> {
        println!("[{}] {}", chat_id, text);
        Ok(())
    }

    async fn send_image(&self, chat_id: &str, image: &ImageArtifact) -> Result<(), String> {
        let ext = match image.mime {
            "image/png" => "png",
            "image/gif" => "gif",
            "image/jpeg" => "jpg",
            _ => "bin",
        };
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let path = self.out_dir.join(format!("meme-{}.{}", n, ext));
        tokio::fs::write(&path, &image.bytes)
            .await
            .map_err(|e| e.to_string())?;
        println!("[{}] <image {} bytes -> {}>", chat_id, image.bytes.len(), path.display());
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = load_config(config_path).context("Failed to load config")?;

    let backend = HttpMemeBackend::from_config(&config.meme.backend)
        .context("Failed to create meme backend")?;
    let store = SqliteAvatarStore::open(&config.avatar.database_path)
        .context("Failed to open avatar database")?;
    let fetcher = QqAvatarFetcher::new(config.avatar.fetch_timeout_secs)
        .context("Failed to create avatar fetcher")?;

    let has_key = config.vision.api_key.is_some() || std::env::var("OPENAI_API_KEY").is_ok();
    let vision: Arc<dyn VisionModel> = if has_key {
        Arc::new(OpenAiVisionClient::from_config(&config.vision))
    } else {
        tracing::warn!("no vision API key configured, using mock vision model");
        Arc::new(MockVisionModel::default())
    };

    let analyzer = AvatarAnalyzer::new(
        Arc::new(ConsolePersonResolver),
        Arc::new(fetcher),
        vision,
        Arc::new(store),
        config.avatar.analysis_prompt.clone(),
    );

    let out_dir = PathBuf::from("workspace");
    std::fs::create_dir_all(&out_dir).context("Failed to create workspace dir")?;
    let sender = Arc::new(ConsoleSender {
        out_dir,
        counter: AtomicUsize::new(0),
    });

    let plugin = QqAvatarMemePlugin::new(&config, Arc::new(backend), analyzer, sender)
        .context("Failed to build plugin")?;
    plugin.start().await;
    tracing::info!(
        commands = ?plugin.registry().command_names(),
        actions = ?plugin.registry().action_names(),
        "plugin ready"
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(person_id) = line.strip_prefix("/avatar ") {
            match plugin.head_description_for_prompt(person_id.trim()).await {
                Some(desc) => println!("{}", format_head_description_for_relation(&desc)),
                None => println!("(无头像印象)"),
            }
            continue;
        }

        if let Some(rest) = line.strip_prefix("/act ") {
            let (name, data) = rest.trim().split_once(' ').unwrap_or((rest.trim(), ""));
            let data = if data.trim().is_empty() {
                serde_json::Value::Null
            } else {
                match serde_json::from_str(data) {
                    Ok(v) => v,
                    Err(e) => {
                        println!("action_data 不是合法 JSON: {}", e);
                        continue;
                    }
                }
            };
            let event = ActionEvent::new(CONSOLE_PLATFORM, CONSOLE_CHAT, CONSOLE_USER)
                .requesting(name)
                .with_data(data);
            report_turn(plugin.registry().handle_turn(&event).await);
            continue;
        }

        let message = MessageEvent::new(CONSOLE_PLATFORM, CONSOLE_CHAT, CONSOLE_USER, line);
        if let Some(outcome) = plugin.registry().handle_message(&message).await {
            tracing::info!(success = outcome.success, message = %outcome.message, "command done");
            continue;
        }

        let turn = ActionEvent::new(CONSOLE_PLATFORM, CONSOLE_CHAT, CONSOLE_USER);
        report_turn(plugin.registry().handle_turn(&turn).await);
    }

    Ok(())
}

fn report_turn(result: Option<(String, qq_avatar_meme::plugins::ActionOutcome)>) {
    match result {
        Some((name, outcome)) => {
            tracing::info!(action = %name, success = outcome.success, message = %outcome.message, "action done")
        }
        None => tracing::debug!("no action this turn"),
    }
}
