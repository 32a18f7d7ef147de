//! 禁止語フィルター
//!
//! 生成テキストから禁止語を取り除きます。プロンプトでも禁止語の使用を
//! 指示していますが、モデルが従わない場合に備えて事後にも除去します。

use std::borrow::Cow;

use tracing::info;

/// 生成テキストに含めてはならない語（固定、設定不可）
pub const DENYLIST: &[&str] = &["vector", "png", "illustration", "teepublic"];

/// 末尾から 1 文字だけ取り除く句読点
const TRAILING_PUNCTUATION: &[char] = &['.', ',', '!', '?', ';', ':'];

/// フィールドの種類（再結合時の区切り文字が異なる）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// タイトル・説明文・メインタグ（空白区切り）
    Text,
    /// サポートタグ（", " 区切り）
    Tags,
}

impl FieldKind {
    fn separator(&self) -> &'static str {
        match self {
            FieldKind::Text => " ",
            FieldKind::Tags => ", ",
        }
    }
}

fn is_denylisted(token: &str) -> bool {
    let lowered = token.to_lowercase();
    let word = lowered
        .strip_suffix(TRAILING_PUNCTUATION)
        .unwrap_or(lowered.as_str());
    DENYLIST.contains(&word)
}

/// 禁止語を取り除く
///
/// `", "` と `" "` で分割し、大文字小文字を区別せず（末尾の句読点 1 文字は無視して）
/// 禁止語と完全一致するトークンだけを取り除きます。
///
/// 何も取り除かなかった場合は入力をそのまま（[`Cow::Borrowed`]）返します。
/// 取り除いた場合は連続する空白を 1 つにまとめ、前後の空白を取り除きます。
pub fn filter_denylisted(text: &str, kind: FieldKind) -> Cow<'_, str> {
    let tokens: Vec<&str> = text
        .split(", ")
        .flat_map(|part| part.split(' '))
        .collect();

    if !tokens.iter().any(|token| is_denylisted(token)) {
        return Cow::Borrowed(text);
    }

    let kept: Vec<&str> = tokens
        .into_iter()
        .filter(|token| {
            let denied = is_denylisted(token);
            if denied {
                info!(token = %token, field = ?kind, "禁止語を削除しました");
            }
            !denied
        })
        .collect();

    let joined = kept.join(kind.separator());
    Cow::Owned(joined.split_whitespace().collect::<Vec<_>>().join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text_is_returned_as_is() {
        let text = "Cute Cat  Sunset";
        let filtered = filter_denylisted(text, FieldKind::Text);

        assert!(matches!(filtered, Cow::Borrowed(_)));
        assert!(std::ptr::eq(&*filtered, text));
    }

    #[test]
    fn test_removes_only_the_denylisted_token() {
        let filtered = filter_denylisted("Retro Vector Cat", FieldKind::Text);
        assert_eq!(filtered, "Retro Cat");
    }

    #[test]
    fn test_case_and_trailing_punctuation() {
        let filtered = filter_denylisted("Sunset PNG. art", FieldKind::Text);
        assert_eq!(filtered, "Sunset art");

        // 部分一致は対象外
        let filtered = filter_denylisted("vectors pngs", FieldKind::Text);
        assert!(matches!(filtered, Cow::Borrowed(_)));
    }

    #[test]
    fn test_tags_are_rejoined_with_commas() {
        let filtered = filter_denylisted("cat, illustration, kitten, pet", FieldKind::Tags);
        assert_eq!(filtered, "cat, kitten, pet");
    }

    #[test]
    fn test_multi_word_tag_is_split_when_modified() {
        let filtered = filter_denylisted("cute vector art, cat", FieldKind::Tags);
        assert_eq!(filtered, "cute, art, cat");
    }

    #[test]
    fn test_filtering_is_a_fixed_point() {
        let once = filter_denylisted("Teepublic funny cat shirt", FieldKind::Text).into_owned();
        let twice = filter_denylisted(&once, FieldKind::Text);
        assert!(matches!(twice, Cow::Borrowed(_)));
        assert_eq!(twice, "funny cat shirt");
    }
}
