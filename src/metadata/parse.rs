//! プロバイダー応答テキストのパース
//!
//! モデルが返すテキストはコードフェンス（```` ```json ````）で囲まれていることがあるため、
//! フェンス記号を取り除いてから JSON としてパースします。

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use super::record::{MetadataRecord, ProductCategory, dedup_tags};

/// パース失敗
#[derive(Debug, thiserror::Error)]
#[error("メタデータ JSON のパースに失敗しました: {0}")]
pub struct ParseError(#[from] serde_json::Error);

#[derive(Debug, Deserialize)]
struct RawMetadata {
    title: String,
    description: String,
    main_tag: String,
    #[serde(default)]
    supporting_tags: RawTags,
    #[serde(default)]
    colors: Value,
}

/// サポートタグはカンマ区切り文字列と配列のどちらでも受け付ける
#[derive(Debug, Default, Deserialize)]
#[serde(untagged)]
enum RawTags {
    Line(String),
    List(Vec<String>),
    #[default]
    Missing,
}

impl RawTags {
    fn into_tags(self) -> Vec<String> {
        match self {
            RawTags::Line(line) => dedup_tags(line.split(',')),
            RawTags::List(list) => dedup_tags(list),
            RawTags::Missing => Vec::new(),
        }
    }
}

/// コードフェンス記号（```` ```json ```` と ```` ``` ````）をすべて取り除く
pub fn strip_code_fences(raw: &str) -> String {
    raw.replace("```json", "").replace("```", "").trim().to_string()
}

/// 応答テキストをメタデータレコードにパースする
///
/// `colors` が欠けている、またはオブジェクトでない場合は空のマップになります。
/// 未知のカテゴリキーや文字列以外の値は無視します（後段の色検証で補完されます）。
pub fn parse_metadata(raw: &str) -> Result<MetadataRecord, ParseError> {
    let parsed: RawMetadata = serde_json::from_str(&strip_code_fences(raw))?;

    let colors = match parsed.colors {
        Value::Object(map) => map
            .into_iter()
            .filter_map(|(key, value)| {
                let category = ProductCategory::from_key(&key)?;
                let color = value.as_str()?.trim().to_string();
                Some((category, color))
            })
            .collect(),
        _ => BTreeMap::new(),
    };

    Ok(MetadataRecord {
        title: parsed.title.trim().to_string(),
        description: parsed.description.trim().to_string(),
        main_tag: parsed.main_tag.trim().to_string(),
        supporting_tags: parsed.supporting_tags.into_tags(),
        colors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "title": "Sunset Cat",
        "description": "Playful cat watching a sunset",
        "main_tag": "cat",
        "supporting_tags": "kitten, feline, pet, kitten, sunset",
        "colors": {"tshirt": "Navy", "hoodie": 3, "mug": "Red"}
    }"#;

    #[test]
    fn test_parse_plain_json() {
        let record = parse_metadata(SAMPLE).unwrap();

        assert_eq!(record.title, "Sunset Cat");
        assert_eq!(record.main_tag, "cat");
        assert_eq!(record.supporting_tags, vec!["kitten", "feline", "pet", "sunset"]);
        assert_eq!(record.colors.len(), 1);
        assert_eq!(record.colors[&ProductCategory::Tshirt], "Navy");
    }

    #[test]
    fn test_parse_fenced_json() {
        let fenced = format!("```json\n{SAMPLE}\n```");
        assert_eq!(parse_metadata(&fenced).unwrap().title, "Sunset Cat");

        let fenced = format!("Here you go:\n```\n{SAMPLE}\n```");
        assert!(parse_metadata(&fenced).is_err());
    }

    #[test]
    fn test_tags_as_array() {
        let raw = r#"{"title": "t", "description": "d", "main_tag": "m", "supporting_tags": ["a", "b", "a"]}"#;
        assert_eq!(parse_metadata(raw).unwrap().supporting_tags, vec!["a", "b"]);
    }

    #[test]
    fn test_missing_or_invalid_colors_become_empty() {
        let raw = r#"{"title": "t", "description": "d", "main_tag": "m"}"#;
        assert!(parse_metadata(raw).unwrap().colors.is_empty());

        let raw = r#"{"title": "t", "description": "d", "main_tag": "m", "colors": "Black"}"#;
        assert!(parse_metadata(raw).unwrap().colors.is_empty());
    }

    #[test]
    fn test_not_json_fails() {
        assert!(parse_metadata("not valid json at all").is_err());
    }

    #[test]
    fn test_missing_title_fails() {
        let raw = r#"{"description": "d", "main_tag": "m"}"#;
        assert!(parse_metadata(raw).is_err());
    }
}
