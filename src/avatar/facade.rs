//! 供其他模块调用的头像印象门面
//!
//! 宿主的 prompt 构建在拼装关系信息时调用，永不报错。

use super::analyzer::AvatarAnalyzer;

/// 获取用于 prompt 的头像印象
pub async fn get_head_description_for_prompt(
    analyzer: &AvatarAnalyzer,
    person_id: &str,
) -> Option<String> {
    let description = analyzer.get_description(person_id).await?;
    if description.is_empty() {
        return None;
    }
    let preview: String = description.chars().take(30).collect();
    tracing::debug!(person_id = %person_id, description = %preview, "head description for prompt");
    Some(description)
}

/// 格式化为关系信息中的一句话
pub fn format_head_description_for_relation(head_description: &str) -> String {
    if head_description.is_empty() {
        return String::new();
    }
    format!("ta的头像印象：{}", head_description)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_head_description() {
        assert_eq!(format_head_description_for_relation(""), "");
        assert_eq!(
            format_head_description_for_relation("一只猫"),
            "ta的头像印象：一只猫"
        );
    }
}
