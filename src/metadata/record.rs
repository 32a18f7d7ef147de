//! メタデータレコードと商品カテゴリ別の色テーブル
//!
//! # 責務
//!
//! - 1 デザイン分の出力単位 [`MetadataRecord`] の定義
//! - 商品カテゴリ [`ProductCategory`] と、カテゴリごとの選択可能な色の固定テーブル
//! - 色の検証と補正 [`validate_colors`]
//! - 生成失敗時に使うデフォルトレコード [`MetadataRecord::fallback`]
//!
//! # 色の補正ルール
//!
//! カテゴリの値が欠けている、または選択肢に含まれない場合は次の順で置き換えます。
//!
//! 1. キッズ系カテゴリ（および baseball）: `Black` が選択肢にあれば `Black`
//! 2. その他のカテゴリ: `White` が選択肢にあれば `White`
//! 3. どちらもなければ選択肢の先頭
//!
//! 補正は冪等で、補正済みのレコードに再度適用しても何も変わりません。

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// 商品カテゴリ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductCategory {
    Tshirt,
    Hoodie,
    Tank,
    Crewneck,
    Longsleeve,
    Baseball,
    KidsTshirt,
    KidsHoodie,
    KidsLongsleeve,
}

impl ProductCategory {
    /// 全カテゴリ（プロンプトに列挙する順）
    pub const ALL: [ProductCategory; 9] = [
        ProductCategory::Tshirt,
        ProductCategory::Hoodie,
        ProductCategory::Tank,
        ProductCategory::Crewneck,
        ProductCategory::Longsleeve,
        ProductCategory::Baseball,
        ProductCategory::KidsTshirt,
        ProductCategory::KidsHoodie,
        ProductCategory::KidsLongsleeve,
    ];

    /// JSON / 設定ファイル上のキー名
    pub fn key(&self) -> &'static str {
        match self {
            ProductCategory::Tshirt => "tshirt",
            ProductCategory::Hoodie => "hoodie",
            ProductCategory::Tank => "tank",
            ProductCategory::Crewneck => "crewneck",
            ProductCategory::Longsleeve => "longsleeve",
            ProductCategory::Baseball => "baseball",
            ProductCategory::KidsTshirt => "kids_tshirt",
            ProductCategory::KidsHoodie => "kids_hoodie",
            ProductCategory::KidsLongsleeve => "kids_longsleeve",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        ProductCategory::ALL.into_iter().find(|category| category.key() == key)
    }

    /// キッズ向けアパレルかどうか（機能フラグで有効化されたときだけピン留めを適用する）
    pub fn is_kids(&self) -> bool {
        matches!(
            self,
            ProductCategory::KidsTshirt | ProductCategory::KidsHoodie | ProductCategory::KidsLongsleeve
        )
    }

    /// 補正時に `Black` を優先するカテゴリかどうか
    fn prefers_black(&self) -> bool {
        self.is_kids() || matches!(self, ProductCategory::Baseball)
    }

    /// 選択可能な色
    pub fn legal_colors(&self) -> &'static [&'static str] {
        match self {
            ProductCategory::Tshirt => &[
                "White", "Asphalt", "Black", "Maroon", "Red", "Soft Pink", "Hot Pink", "Brown", "Yellow",
                "Creme", "Kelly", "Navy", "Royal Blue", "Light Blue", "Purple", "Heather",
            ],
            ProductCategory::Hoodie => &[
                "Oatmeal Heather", "Sport Green", "Black", "Burgundy", "Creme", "Navy", "Colony Blue",
                "Vintage Heather", "Charcoal Heather",
            ],
            ProductCategory::Tank => &["White", "Black", "Red", "Navy"],
            ProductCategory::Crewneck => &[
                "White", "Black", "Dark Green", "Navy", "Royal Blue", "Heather", "Charcoal Heather",
            ],
            ProductCategory::Longsleeve => &[
                "White", "Black", "Red", "Dark Green", "Navy", "Royal Blue", "Light Blue", "Heather",
            ],
            ProductCategory::Baseball => &[
                "Black/White", "White/Black", "White/Royal", "White/Red", "White/Kelly", "White/Navy",
            ],
            ProductCategory::KidsTshirt => &[
                "White", "Asphalt", "Black", "Red", "Soft Pink", "Orange", "Tennessee Orange", "Yellow",
                "Grass", "Navy", "Royal Blue", "Coastal Blue", "Light Blue", "Heather",
            ],
            ProductCategory::KidsHoodie => &["Black", "Navy", "Red Heather", "Vintage Royal"],
            ProductCategory::KidsLongsleeve => &["Black", "Navy", "Deep Royal"],
        }
    }

    pub fn is_legal(&self, color: &str) -> bool {
        self.legal_colors().contains(&color)
    }

    /// 不正・欠損時に使う色
    pub fn fallback_color(&self) -> &'static str {
        let legal = self.legal_colors();
        let preferred = if self.prefers_black() { "Black" } else { "White" };
        if legal.contains(&preferred) {
            preferred
        } else {
            legal[0]
        }
    }
}

impl fmt::Display for ProductCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// 1 デザイン分のメタデータ
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetadataRecord {
    pub title: String,
    pub description: String,
    pub main_tag: String,
    /// 重複なし・順序あり
    pub supporting_tags: Vec<String>,
    pub colors: BTreeMap<ProductCategory, String>,
}

impl MetadataRecord {
    /// 生成に失敗したときのデフォルトレコード
    pub fn fallback() -> Self {
        let colors = ProductCategory::ALL
            .into_iter()
            .map(|category| {
                let color = match category {
                    ProductCategory::Baseball => "Black/White",
                    _ => "Black",
                };
                (category, color.to_string())
            })
            .collect();

        Self {
            title: "Unique Design".to_string(),
            description: "A creative and unique design for your style".to_string(),
            main_tag: "design".to_string(),
            supporting_tags: ["art", "creative", "style", "fashion", "unique"]
                .into_iter()
                .map(str::to_string)
                .collect(),
            colors,
        }
    }

    /// サポートタグをフォーム入力用のカンマ区切り文字列にする
    pub fn tags_line(&self) -> String {
        self.supporting_tags.join(", ")
    }
}

/// タグを重複なしのリストにまとめる（大文字小文字を区別せず最初の出現を残す）
pub fn dedup_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = Vec::<String>::new();
    let mut out = Vec::new();
    for tag in tags {
        let tag = tag.as_ref().trim();
        if tag.is_empty() {
            continue;
        }
        let lowered = tag.to_lowercase();
        if seen.contains(&lowered) {
            continue;
        }
        seen.push(lowered);
        out.push(tag.to_string());
    }
    out
}

/// 全カテゴリの色を検証し、欠損・不正な値を補正する
///
/// 補正したカテゴリの一覧を返します（ログ出力用）。
/// 補正済みのレコードに対しては空の一覧を返し、レコードを変更しません。
pub fn validate_colors(record: &mut MetadataRecord) -> Vec<ProductCategory> {
    let mut repaired = Vec::new();
    for category in ProductCategory::ALL {
        let legal = record
            .colors
            .get(&category)
            .is_some_and(|color| category.is_legal(color));
        if !legal {
            record
                .colors
                .insert(category, category.fallback_color().to_string());
            repaired.push(category);
        }
    }
    repaired
}
