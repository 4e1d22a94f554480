//! 表情包目录
//!
//! 由后端给出的 MemeInfo 构建，构建后不可变；重新加载时整体替换。
//! 查找规则：名称 / key / 任一别名，小写后精确匹配；未命中时按包含关系给出最多 5 个候选。
//! 同一名称对应多个表情包时视为查找失败，候选即这些表情包。

use std::collections::HashMap;

use crate::core::MemeError;

use super::backend::MemeInfo;

/// 未命中时最多给出的候选数
pub const MAX_SUGGESTIONS: usize = 5;

/// 无标签时的分类名
pub const DEFAULT_CATEGORY: &str = "其他";

/// 目录中的单个表情包
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemeEntry {
    /// 生成库中的 key，渲染时使用
    pub key: String,
    /// 展示名：首个关键词，没有关键词时为 key
    pub name: String,
    pub aliases: Vec<String>,
    pub category: String,
    /// 必填文字槽位数
    pub min_texts: usize,
    pub max_texts: usize,
    /// 需要的图片数；只传文字的生成路径无法满足大于 0 的表情包
    pub min_images: usize,
}

impl From<MemeInfo> for MemeEntry {
    fn from(info: MemeInfo) -> Self {
        let name = info
            .keywords
            .first()
            .cloned()
            .unwrap_or_else(|| info.key.clone());
        let category = info
            .tags
            .first()
            .cloned()
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_string());
        Self {
            key: info.key,
            name,
            aliases: info.keywords,
            category,
            min_texts: info.min_texts,
            max_texts: info.max_texts.max(info.min_texts),
            min_images: info.min_images,
        }
    }
}

impl MemeEntry {
    /// 只靠文字即可生成
    pub fn is_text_only(&self) -> bool {
        self.min_images == 0
    }

    /// key、展示名与全部别名（原样）
    fn labels(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.key.as_str())
            .chain(std::iter::once(self.name.as_str()))
            .chain(self.aliases.iter().map(String::as_str))
    }

    /// 菜单中的展示文本：前两个别名用「、」连接，没有别名时为 key
    pub fn menu_label(&self) -> String {
        if self.aliases.is_empty() {
            self.key.clone()
        } else {
            self.aliases
                .iter()
                .take(2)
                .cloned()
                .collect::<Vec<_>>()
                .join("、")
        }
    }
}

/// 不可变目录：按 (分类, 名称) 排序的条目 + 小写名称索引
#[derive(Debug, Default)]
pub struct MemeCatalog {
    entries: Vec<MemeEntry>,
    /// 小写名称 -> 条目下标；多于一个即为歧义名称
    index: HashMap<String, Vec<usize>>,
}

impl MemeCatalog {
    pub fn new(infos: Vec<MemeInfo>) -> Self {
        let mut entries: Vec<MemeEntry> = infos.into_iter().map(MemeEntry::from).collect();
        entries.sort_by(|a, b| {
            a.category
                .cmp(&b.category)
                .then_with(|| a.name.cmp(&b.name))
                .then_with(|| a.key.cmp(&b.key))
        });

        let mut index: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, entry) in entries.iter().enumerate() {
            for label in entry.labels() {
                let slots = index.entry(normalize(label)).or_default();
                if !slots.contains(&i) {
                    slots.push(i);
                }
            }
        }

        let ambiguous = index.values().filter(|slots| slots.len() > 1).count();
        if ambiguous > 0 {
            tracing::debug!(ambiguous, "meme names shared by several entries");
        }

        Self { entries, index }
    }

    pub fn list_memes(&self) -> &[MemeEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn find_by_name(&self, name: &str) -> Result<&MemeEntry, MemeError> {
        let key = normalize(name);
        let suggestions = match self.index.get(&key).map(Vec::as_slice) {
            Some(&[i]) => return Ok(&self.entries[i]),
            Some(clashing) if !clashing.is_empty() => clashing
                .iter()
                .map(|&i| self.entries[i].name.clone())
                .take(MAX_SUGGESTIONS)
                .collect(),
            _ => self.suggest(&key),
        };
        Err(MemeError::NotFound {
            name: name.trim().to_string(),
            suggestions,
        })
    }

    /// 包含关系（任一方向）匹配的候选展示名
    fn suggest(&self, key: &str) -> Vec<String> {
        if key.is_empty() {
            return Vec::new();
        }
        self.entries
            .iter()
            .filter(|e| {
                e.labels().any(|label| {
                    let label = normalize(label);
                    !label.is_empty() && (label.contains(key) || key.contains(label.as_str()))
                })
            })
            .map(|e| e.name.clone())
            .take(MAX_SUGGESTIONS)
            .collect()
    }
}

fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MemeCatalog {
        MemeCatalog::new(vec![
            MemeInfo::new("luxunsay")
                .with_keywords(&["鲁迅说", "鲁迅说过"])
                .with_tags(&["鲁迅"])
                .with_texts(1, 1),
            MemeInfo::new("petpet").with_keywords(&["摸", "摸摸"]),
            MemeInfo::new("Nokia").with_keywords(&["诺基亚"]).with_tags(&["手机"]).with_texts(1, 1),
            MemeInfo::new("no_keyword"),
        ])
    }

    #[test]
    fn test_find_by_key_name_and_alias_case_insensitive() {
        let catalog = sample();
        let by_key = catalog.find_by_name("LUXUNSAY").unwrap().clone();
        let by_alias = catalog.find_by_name("鲁迅说过").unwrap().clone();
        let by_name = catalog.find_by_name(" 鲁迅说 ").unwrap().clone();
        assert_eq!(by_key, by_alias);
        assert_eq!(by_key, by_name);
        assert_eq!(catalog.find_by_name("nokia").unwrap().key, "Nokia");
    }

    #[test]
    fn test_entry_defaults() {
        let catalog = sample();
        let entry = catalog.find_by_name("no_keyword").unwrap();
        assert_eq!(entry.name, "no_keyword");
        assert_eq!(entry.category, DEFAULT_CATEGORY);
        assert_eq!(entry.menu_label(), "no_keyword");
        assert_eq!(catalog.find_by_name("鲁迅说").unwrap().menu_label(), "鲁迅说、鲁迅说过");
    }

    #[test]
    fn test_sorted_by_category_then_name() {
        let catalog = sample();
        let cats: Vec<(&str, &str)> = catalog
            .list_memes()
            .iter()
            .map(|e| (e.category.as_str(), e.name.as_str()))
            .collect();
        let mut sorted = cats.clone();
        sorted.sort();
        assert_eq!(cats, sorted);
    }

    #[test]
    fn test_no_fuzzy_match_only_suggestions() {
        let catalog = sample();
        match catalog.find_by_name("鲁迅") {
            Err(MemeError::NotFound { name, suggestions }) => {
                assert_eq!(name, "鲁迅");
                assert_eq!(suggestions, vec!["鲁迅说".to_string()]);
            }
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_shared_alias_is_ambiguous() {
        let catalog = MemeCatalog::new(vec![
            MemeInfo::new("a_key").with_keywords(&["摸头", "摸"]),
            MemeInfo::new("b_key").with_keywords(&["摸摸", "摸"]),
        ]);
        match catalog.find_by_name("摸") {
            Err(MemeError::NotFound { name, suggestions }) => {
                assert_eq!(name, "摸");
                assert_eq!(suggestions, vec!["摸头".to_string(), "摸摸".to_string()]);
            }
            other => panic!("expected NotFound, got {:?}", other),
        }
        // 各自独有的名称仍可精确命中
        assert_eq!(catalog.find_by_name("摸头").unwrap().key, "a_key");
        assert_eq!(catalog.find_by_name("B_KEY").unwrap().key, "b_key");
    }

    #[test]
    fn test_suggestions_capped() {
        let infos = (0..10)
            .map(|i| MemeInfo::new(format!("cat{}", i)))
            .collect::<Vec<_>>();
        let catalog = MemeCatalog::new(infos);
        match catalog.find_by_name("cat") {
            Err(MemeError::NotFound { suggestions, .. }) => {
                assert_eq!(suggestions.len(), MAX_SUGGESTIONS)
            }
            other => panic!("expected NotFound, got {:?}", other),
        }
    }
}
