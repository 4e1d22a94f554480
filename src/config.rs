//! 插件配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `MEME__*` 覆盖（双下划线表示嵌套，如 `MEME__MEME__TRIGGER_PROBABILITY=0.3`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 插件配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct PluginConfig {
    #[serde(default)]
    pub plugin: PluginSection,
    #[serde(default)]
    pub meme: MemeSection,
    #[serde(default)]
    pub avatar: AvatarSection,
    #[serde(default)]
    pub vision: VisionSection,
}

/// [plugin] 段：总开关
#[derive(Debug, Clone, Deserialize)]
pub struct PluginSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for PluginSection {
    fn default() -> Self {
        Self { enabled: true }
    }
}

fn default_true() -> bool {
    true
}

/// [meme] 段：命令模式 / Action 模式开关、随机触发概率、菜单展示上限
#[derive(Debug, Clone, Deserialize)]
pub struct MemeSection {
    #[serde(default = "default_true")]
    pub enable_command_mode: bool,
    #[serde(default = "default_true")]
    pub enable_action_mode: bool,
    /// auto_meme 随机激活概率，取值 [0, 1]
    #[serde(default = "default_trigger_probability")]
    pub trigger_probability: f64,
    /// /menu 最多展示的表情包数
    #[serde(default = "default_menu_limit")]
    pub menu_limit: usize,
    #[serde(default)]
    pub backend: MemeBackendSection,
}

impl Default for MemeSection {
    fn default() -> Self {
        Self {
            enable_command_mode: true,
            enable_action_mode: true,
            trigger_probability: default_trigger_probability(),
            menu_limit: default_menu_limit(),
            backend: MemeBackendSection::default(),
        }
    }
}

fn default_trigger_probability() -> f64 {
    0.15
}

fn default_menu_limit() -> usize {
    50
}

/// [meme.backend] 段：meme-generator HTTP 服务地址与超时
#[derive(Debug, Clone, Deserialize)]
pub struct MemeBackendSection {
    #[serde(default = "default_backend_url")]
    pub base_url: String,
    #[serde(default = "default_backend_timeout")]
    pub timeout_secs: u64,
}

impl Default for MemeBackendSection {
    fn default() -> Self {
        Self {
            base_url: default_backend_url(),
            timeout_secs: default_backend_timeout(),
        }
    }
}

fn default_backend_url() -> String {
    "http://127.0.0.1:2233".to_string()
}

fn default_backend_timeout() -> u64 {
    30
}

/// [avatar] 段：头像分析开关、提示词、抓取超时、数据库路径
#[derive(Debug, Clone, Deserialize)]
pub struct AvatarSection {
    #[serde(default = "default_true")]
    pub enable_analysis: bool,
    #[serde(default = "default_analysis_prompt")]
    pub analysis_prompt: String,
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

impl Default for AvatarSection {
    fn default() -> Self {
        Self {
            enable_analysis: true,
            analysis_prompt: default_analysis_prompt(),
            fetch_timeout_secs: default_fetch_timeout(),
            database_path: default_database_path(),
        }
    }
}

fn default_analysis_prompt() -> String {
    "分析这个QQ头像，简洁描述图片内容（50字内）".to_string()
}

fn default_fetch_timeout() -> u64 {
    15
}

fn default_database_path() -> PathBuf {
    PathBuf::from("data/avatar_descriptions.db")
}

/// [vision] 段：视觉模型（OpenAI 兼容端点）
#[derive(Debug, Clone, Deserialize)]
pub struct VisionSection {
    #[serde(default = "default_vision_model")]
    pub model: String,
    pub base_url: Option<String>,
    /// 未设置时读取 OPENAI_API_KEY
    pub api_key: Option<String>,
}

impl Default for VisionSection {
    fn default() -> Self {
        Self {
            model: default_vision_model(),
            base_url: None,
            api_key: None,
        }
    }
}

fn default_vision_model() -> String {
    "gpt-4o-mini".to_string()
}

/// 从 config 目录加载配置，环境变量 MEME__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 MEME__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<PluginConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("MEME")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
