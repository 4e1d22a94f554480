//! 插件错误类型
//!
//! 命令路径上的错误会渲染成聊天回复；头像门面路径上的错误只记日志，退化为「无描述」。

use thiserror::Error;

/// 表情包相关错误（目录查找、生成）
#[derive(Error, Debug)]
pub enum MemeError {
    /// 表情包库未加载或加载失败，功能不可用
    #[error("Meme catalog unavailable: {0}")]
    CatalogUnavailable(String),

    /// 名称/别名未命中；suggestions 为包含关系匹配到的候选（最多 5 个）
    #[error("Meme not found: {name}")]
    NotFound {
        name: String,
        suggestions: Vec<String>,
    },

    /// 生成库渲染失败（网络、素材缺失、内部异常）
    #[error("Meme generation failed for {name}: {reason}")]
    GenerationFailed { name: String, reason: String },

    /// 后端原始错误，由 MemeManager 转换为上面两类
    #[error("Meme backend error: {0}")]
    Backend(String),
}

/// 头像分析相关错误
#[derive(Error, Debug)]
pub enum AvatarError {
    #[error("Platform unsupported: {0}")]
    PlatformUnsupported(String),

    #[error("Person not bound to a platform identity")]
    PersonNotFound,

    #[error("Avatar fetch failed: {0}")]
    FetchFailed(String),

    #[error("Avatar analysis failed: {0}")]
    AnalysisFailed(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AvatarError {
    /// 日志用的简短类别名
    pub fn kind(&self) -> &'static str {
        match self {
            AvatarError::PlatformUnsupported(_) => "platform_unsupported",
            AvatarError::PersonNotFound => "person_not_found",
            AvatarError::FetchFailed(_) => "fetch_failed",
            AvatarError::AnalysisFailed(_) => "analysis_failed",
            AvatarError::Storage(_) | AvatarError::Io(_) => "storage",
        }
    }
}

/// 组件注册与执行错误
#[derive(Error, Debug)]
pub enum PluginError {
    #[error("Component already registered: {0}")]
    AlreadyRegistered(String),

    #[error("Component execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Plugin configuration error: {0}")]
    Config(String),
}

impl From<MemeError> for PluginError {
    fn from(e: MemeError) -> Self {
        PluginError::ExecutionFailed(e.to_string())
    }
}

impl From<AvatarError> for PluginError {
    fn from(e: AvatarError) -> Self {
        PluginError::ExecutionFailed(e.to_string())
    }
}
