//! 命令组件：/menu 查看表情包菜单，/meme <名称> [文字]... 生成表情包

use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;

use crate::core::{MemeError, PluginError};
use crate::meme::{MemeEntry, MemeManager};

use super::{Command, CommandContext, CommandOutcome};

pub const MSG_UNAVAILABLE: &str = "表情包功能未启用";
pub const MSG_EMPTY_CATALOG: &str = "当前没有可用的表情包";
pub const MSG_GENERATION_FAILED: &str = "生成失败";

/// 每个分类在菜单里最多列出的表情包数
const MENU_ITEMS_PER_CATEGORY: usize = 10;

/// 渲染菜单：按目录顺序分组，只看前 limit 个表情包，末行给出总数
pub fn render_menu(entries: &[MemeEntry], limit: usize) -> String {
    let mut lines = vec![
        "表情包菜单".to_string(),
        String::new(),
        "使用: /meme <名称> [文字]".to_string(),
        String::new(),
    ];

    let mut categories: Vec<(&str, Vec<String>)> = Vec::new();
    for entry in entries.iter().take(limit) {
        let label = entry.menu_label();
        match categories.iter_mut().find(|(c, _)| *c == entry.category) {
            Some((_, labels)) => labels.push(label),
            None => categories.push((entry.category.as_str(), vec![label])),
        }
    }

    for (category, labels) in categories {
        lines.push(format!("[{}]", category));
        lines.push(
            labels
                .into_iter()
                .take(MENU_ITEMS_PER_CATEGORY)
                .collect::<Vec<_>>()
                .join(", "),
        );
        lines.push(String::new());
    }

    lines.push(format!("共{}个可用", entries.len()));
    lines.join("\n")
}

/// 未命中时的提示：附带候选与 /menu 指引
pub fn not_found_hint(name: &str, suggestions: &[String]) -> String {
    let mut hint = format!("未找到表情包: {}", name);
    if !suggestions.is_empty() {
        hint.push_str(&format!("\n你是不是想找: {}", suggestions.join("、")));
    }
    hint.push_str("\n使用 /menu 查看可用表情包");
    hint
}

/// 参数串按空白切分为文字列表
pub fn tokenize(params: &str) -> Vec<String> {
    params.split_whitespace().map(str::to_string).collect()
}

pub struct MemeMenuCommand {
    memes: Arc<MemeManager>,
    menu_limit: usize,
    pattern: Regex,
}

impl MemeMenuCommand {
    pub fn new(memes: Arc<MemeManager>, menu_limit: usize) -> Result<Self, PluginError> {
        Ok(Self {
            memes,
            menu_limit,
            pattern: Regex::new(r"^/menu\s*$").map_err(|e| PluginError::Config(e.to_string()))?,
        })
    }
}

#[async_trait]
impl Command for MemeMenuCommand {
    fn name(&self) -> &str {
        "meme_menu"
    }

    fn description(&self) -> &str {
        "查看所有可用的表情包列表"
    }

    fn pattern(&self) -> &Regex {
        &self.pattern
    }

    async fn execute(&self, ctx: &CommandContext<'_>) -> Result<CommandOutcome, PluginError> {
        let entries = match self.memes.list_memes().await {
            Ok(entries) => entries,
            Err(_) => {
                ctx.reply(MSG_UNAVAILABLE).await?;
                return Ok(CommandOutcome::failed("meme catalog unavailable"));
            }
        };

        if entries.is_empty() {
            ctx.reply(MSG_EMPTY_CATALOG).await?;
            return Ok(CommandOutcome::success("empty catalog"));
        }

        ctx.reply(&render_menu(&entries, self.menu_limit)).await?;
        Ok(CommandOutcome::success("menu sent"))
    }
}

pub struct MemeGenerateCommand {
    memes: Arc<MemeManager>,
    pattern: Regex,
}

impl MemeGenerateCommand {
    pub fn new(memes: Arc<MemeManager>) -> Result<Self, PluginError> {
        Ok(Self {
            memes,
            pattern: Regex::new(r"^/meme\s+(?P<meme_key>\S+)(?P<params>.*)?$")
                .map_err(|e| PluginError::Config(e.to_string()))?,
        })
    }
}

#[async_trait]
impl Command for MemeGenerateCommand {
    fn name(&self) -> &str {
        "meme_generate"
    }

    fn description(&self) -> &str {
        "生成指定的表情包"
    }

    fn pattern(&self) -> &Regex {
        &self.pattern
    }

    async fn execute(&self, ctx: &CommandContext<'_>) -> Result<CommandOutcome, PluginError> {
        let meme_key = ctx.group("meme_key").trim();
        let texts = tokenize(ctx.group("params"));

        let entry = match self.memes.find_meme(meme_key).await {
            Ok(entry) => entry,
            Err(MemeError::NotFound { name, suggestions }) => {
                ctx.reply(&not_found_hint(&name, &suggestions)).await?;
                return Ok(CommandOutcome::failed(format!("not found: {}", name)));
            }
            Err(_) => {
                ctx.reply(MSG_UNAVAILABLE).await?;
                return Ok(CommandOutcome::failed("meme catalog unavailable"));
            }
        };

        match self.memes.generate(&entry, &texts).await {
            Ok(image) => {
                ctx.send_image(&image).await?;
                Ok(CommandOutcome::success(format!("generated {}", entry.key)))
            }
            Err(e) => {
                ctx.reply(MSG_GENERATION_FAILED).await?;
                Ok(CommandOutcome::failed(e.to_string()))
            }
        }
    }
}
