//! プロバイダー非依存のプロンプト生成
//!
//! # 責務
//!
//! - 設定と呼び出し元のヒント（メインタグ・サジェストタグ）からプロンプトを組み立てる
//! - サポートタグの出し方を 3 つのモードから決定する（[`TagPlan`]）
//!
//! 同じ設定と同じヒントからは常に同じプロンプトが生成されます。
//!
//! # タグのモード
//!
//! | ヒント | モード | サポートタグ |
//! |--------|--------|-------------|
//! | メイン + サジェスト | [`TagPlan::Split`] | `round(N × 0.4)` 個をメイン、残りをサジェストに関連付け |
//! | メインのみ | [`TagPlan::MainOnly`] | すべてメインタグに関連付け |
//! | なし | [`TagPlan::Free`] | 画像から自由に決定 |

use serde::Serialize;

use crate::config::{DescriptionLength, Settings};

use super::filter::DENYLIST;
use super::record::ProductCategory;

/// 呼び出し元から渡されるタグのヒント
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TagHints {
    pub main_tag: Option<String>,
    pub suggestion_tag: Option<String>,
}

impl TagHints {
    /// 前後の空白を取り除き、空文字列は未指定として扱う
    pub fn new(main_tag: Option<&str>, suggestion_tag: Option<&str>) -> Self {
        let clean = |value: Option<&str>| {
            value
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        Self {
            main_tag: clean(main_tag),
            suggestion_tag: clean(suggestion_tag),
        }
    }
}

/// サポートタグの出し方
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagPlan {
    /// メインタグとサジェストタグの両方に分けて関連付ける
    Split {
        main_tag: String,
        suggestion_tag: String,
        main_count: u32,
        suggestion_count: u32,
    },
    /// すべてメインタグに関連付ける
    MainOnly { main_tag: String },
    /// 画像から自由に決める
    Free,
}

impl TagPlan {
    /// ヒントと設定タグ数からモードを決定する
    ///
    /// サジェストタグだけが指定された場合はヒントなしと同じ扱いです。
    pub fn resolve(hints: &TagHints, total: u32) -> Self {
        match (&hints.main_tag, &hints.suggestion_tag) {
            (Some(main), Some(suggestion)) => {
                let (main_count, suggestion_count) = split_tag_count(total);
                TagPlan::Split {
                    main_tag: main.clone(),
                    suggestion_tag: suggestion.clone(),
                    main_count,
                    suggestion_count,
                }
            }
            (Some(main), None) => TagPlan::MainOnly {
                main_tag: main.clone(),
            },
            _ => TagPlan::Free,
        }
    }
}

/// メインタグ側 `round(total × 0.4)`、サジェスト側はその残り
///
/// 小さい total でもこの計算をそのまま使う（total=1 → 0/1, total=2 → 1/1）。
pub fn split_tag_count(total: u32) -> (u32, u32) {
    let main = (f64::from(total) * 0.4).round() as u32;
    (main, total - main)
}

/// プロンプトビルダー
pub struct PromptBuilder<'a> {
    settings: &'a Settings,
}

impl<'a> PromptBuilder<'a> {
    pub fn new(settings: &'a Settings) -> Self {
        Self { settings }
    }

    /// プロンプトを組み立てる
    pub fn build(&self, hints: &TagHints) -> String {
        let total = self.settings.supporting_tags_count();
        let plan = TagPlan::resolve(hints, total);

        let (title, main_tag, tags) = match &plan {
            TagPlan::Split {
                main_tag,
                suggestion_tag,
                main_count,
                suggestion_count,
            } => (
                "1. \"title\": A catchy, SEO-friendly title (max 30 chars) related to the image and the main tag.".to_string(),
                format!("3. \"main_tag\": Use this exact text: \"{main_tag}\"."),
                format!(
                    "4. \"supporting_tags\": A comma-separated list of exactly {total} unique tags. It is CRITICAL that:\n   \
                     - Exactly {main_count} tags are directly related to the main tag \"{main_tag}\".\n   \
                     - Exactly {suggestion_count} tags are directly related to the suggestion tag \"{suggestion_tag}\".\n\
                     The tags must expand on the provided themes, not just describe the image."
                ),
            ),
            TagPlan::MainOnly { main_tag } => (
                "1. \"title\": A catchy, SEO-friendly title (max 30 chars) related to the image and the main tag.".to_string(),
                format!("3. \"main_tag\": Use this exact text: \"{main_tag}\"."),
                format!(
                    "4. \"supporting_tags\": A comma-separated list of exactly {total} unique tags. \
                     It is CRITICAL that these tags are directly and strongly related to the provided main tag \"{main_tag}\". \
                     For example, if the main tag is \"cat\", supporting tags could be \"kitten, feline, pet, meow, cat lover\". \
                     The tags must expand on the main tag's theme, not just describe the image."
                ),
            ),
            TagPlan::Free => (
                "1. \"title\": A catchy, SEO-friendly title (max 30 chars).".to_string(),
                "3. \"main_tag\": The single most important tag based on the image.".to_string(),
                format!(
                    "4. \"supporting_tags\": A comma-separated list of exactly {total} unique, relevant tags based on the image."
                ),
            ),
        };

        [
            self.preamble(),
            title,
            self.description_part().to_string(),
            main_tag,
            tags,
            color_part(),
        ]
        .join("\n")
    }

    fn preamble(&self) -> String {
        let copyright = if self.settings.avoid_copyright() {
            "\nIt is FORBIDDEN to use any copyrighted material, brand names, or specific character names from movies, books, or games. Be generic."
        } else {
            ""
        };
        format!(
            "Act as an expert in Print-on-Demand SEO for Teepublic. Analyze the provided design image.\n\
             Generate a valid JSON object. It is CRITICAL that the output is ONLY the JSON object and nothing else.{copyright}\n\
             Do not use these forbidden words: {}.\n\
             The JSON should have five keys: \"title\", \"description\", \"main_tag\", \"supporting_tags\", and \"colors\".",
            DENYLIST.join(", ")
        )
    }

    fn description_part(&self) -> &'static str {
        match self.settings.description_length() {
            DescriptionLength::Long => {
                "2. \"description\": Write a natural, human-sounding description that accurately describes the design while being engaging and SEO-friendly.\n\
                 Focus on what the design visually shows, its style, and who might enjoy wearing it.\n\
                 Use descriptive language that paints a picture for potential buyers (around 30-50 words).\n\
                 Be specific about the visual elements - mention colors, shapes, patterns, and style if relevant.\n\
                 Avoid robotic or generic phrases like \"this awesome design\" or \"perfect for anyone\"."
            }
            DescriptionLength::Short => {
                "2. \"description\": A concise, human-friendly description that accurately captures the essence of the design.\n\
                 Be specific about what the design shows - mention key visual elements that make it unique.\n\
                 Make it sound natural and engaging, not like SEO spam (strict maximum of 13 words).\n\
                 Example format: \"Playful cat artwork with geometric patterns in vibrant sunset colors\""
            }
        }
    }
}

fn color_part() -> String {
    let mut part = format!(
        "5. \"colors\": An object with {} keys. For each key, choose the best color from its respective list:",
        ProductCategory::ALL.len()
    );
    for category in ProductCategory::ALL {
        part.push_str(&format!(
            "\n   - \"{}\": Choose from: {}",
            category.key(),
            category.legal_colors().join(", ")
        ));
    }
    part
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(toml: &str) -> Settings {
        Settings::from_toml(toml).unwrap()
    }

    #[test]
    fn test_split_tag_count() {
        assert_eq!(split_tag_count(5), (2, 3));
        assert_eq!(split_tag_count(10), (4, 6));
        assert_eq!(split_tag_count(1), (0, 1));
        assert_eq!(split_tag_count(2), (1, 1));
        assert_eq!(split_tag_count(4), (2, 2));
    }

    #[test]
    fn test_hints_are_trimmed() {
        let hints = TagHints::new(Some("  cat "), Some("   "));
        assert_eq!(hints.main_tag.as_deref(), Some("cat"));
        assert_eq!(hints.suggestion_tag, None);
    }

    #[test]
    fn test_plan_resolution() {
        let both = TagHints::new(Some("cat"), Some("funny"));
        assert_eq!(
            TagPlan::resolve(&both, 5),
            TagPlan::Split {
                main_tag: "cat".to_string(),
                suggestion_tag: "funny".to_string(),
                main_count: 2,
                suggestion_count: 3,
            }
        );

        let main_only = TagHints::new(Some("cat"), None);
        assert_eq!(
            TagPlan::resolve(&main_only, 5),
            TagPlan::MainOnly { main_tag: "cat".to_string() }
        );

        let suggestion_only = TagHints::new(None, Some("funny"));
        assert_eq!(TagPlan::resolve(&suggestion_only, 5), TagPlan::Free);
    }

    #[test]
    fn test_prompt_with_both_hints() {
        let settings = settings("supporting_tags_count = 5");
        let prompt = PromptBuilder::new(&settings).build(&TagHints::new(Some("cat"), Some("funny")));

        assert!(prompt.contains("exactly 5 unique tags"));
        assert!(prompt.contains("Exactly 2 tags are directly related to the main tag \"cat\""));
        assert!(prompt.contains("Exactly 3 tags are directly related to the suggestion tag \"funny\""));
        assert!(prompt.contains("Use this exact text: \"cat\""));
    }

    #[test]
    fn test_prompt_without_hints() {
        let settings = settings("supporting_tags_count = 7");
        let prompt = PromptBuilder::new(&settings).build(&TagHints::default());

        assert!(prompt.contains("exactly 7 unique, relevant tags based on the image"));
        assert!(prompt.contains("The single most important tag"));
    }

    #[test]
    fn test_description_modes() {
        let short = PromptBuilder::new(&settings("")).build(&TagHints::default());
        assert!(short.contains("strict maximum of 13 words"));

        let long = PromptBuilder::new(&settings("description_length = \"long\"")).build(&TagHints::default());
        assert!(long.contains("around 30-50 words"));
    }

    #[test]
    fn test_denylist_and_copyright_instructions() {
        let prompt = PromptBuilder::new(&settings("")).build(&TagHints::default());
        assert!(prompt.contains("forbidden words: vector, png, illustration, teepublic"));
        assert!(prompt.contains("It is FORBIDDEN to use any copyrighted material"));

        let prompt = PromptBuilder::new(&settings("avoid_copyright = false")).build(&TagHints::default());
        assert!(!prompt.contains("copyrighted material"));
    }

    #[test]
    fn test_prompt_lists_every_category() {
        let prompt = PromptBuilder::new(&settings("")).build(&TagHints::default());
        for category in ProductCategory::ALL {
            assert!(prompt.contains(&format!("\"{}\": Choose from:", category.key())));
        }
        assert!(prompt.contains("Black/White, White/Black"));
    }

    #[test]
    fn test_prompt_is_deterministic() {
        let settings = settings("supporting_tags_count = 6");
        let hints = TagHints::new(Some("dog"), None);
        let builder = PromptBuilder::new(&settings);
        assert_eq!(builder.build(&hints), builder.build(&hints));
    }
}
