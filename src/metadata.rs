//! メタデータの生成と後処理
//!
//! # モジュール構成
//!
//! - `record` - [`MetadataRecord`] と商品カテゴリ・色の検証
//! - `prompt` - プロンプト生成とタグのヒント
//! - `parse` - プロバイダー応答のパース
//! - `filter` - 禁止語フィルター
//! - `pipeline` - 上記をつなぐ [`MetadataPipeline`]

pub mod record;
pub mod prompt;
pub mod parse;
pub mod filter;
pub mod pipeline;

pub use record::{MetadataRecord, ProductCategory, dedup_tags, validate_colors};
pub use prompt::{PromptBuilder, TagHints, TagPlan};
pub use parse::{ParseError, parse_metadata};
pub use filter::{FieldKind, filter_denylisted};
pub use pipeline::MetadataPipeline;
