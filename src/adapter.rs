//! ページ自動化アダプターの抽象化
//!
//! # 責務
//!
//! - 対象ページ（出品フォーム等）を操作する [`PageAdapter`] トレイトを定義
//! - アダプターとオーケストレーターの間でやり取りするデザイン画像 [`ImageData`] と
//!   遷移完了通知 [`NavigationComplete`] を提供
//!
//! # 遷移完了の通知
//!
//! [`PageAdapter::advance_to_next_item`] は遷移を「要求」するだけです。遷移が
//! 完了したら、アダプターはオーケストレーターが持つ非同期チャネルに
//! [`NavigationComplete`] を送ります。オーケストレーターは自分の
//! [`PageAdapter::target_id`] と一致する通知だけを受け付けます。
//!
//! # モジュール構成
//!
//! - `directory` - 画像ディレクトリを対象にしたローカル実装 [`DirectoryAdapter`]

pub mod directory;

pub use directory::DirectoryAdapter;

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};

use crate::config::Settings;
use crate::error::AdapterError;
use crate::metadata::MetadataRecord;

/// デザイン画像
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    /// 画像の所在（URL またはパス）
    pub url: String,
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl ImageData {
    /// MIME タイプは拡張子から推定する（不明な場合は `image/jpeg`）
    pub fn new(url: impl Into<String>, bytes: Vec<u8>) -> Self {
        let url = url.into();
        let mime_type = guess_mime_type(&url).to_string();
        Self {
            url,
            bytes,
            mime_type,
        }
    }

    pub fn base64(&self) -> String {
        general_purpose::STANDARD.encode(&self.bytes)
    }

    /// `data:` URL 形式
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.base64())
    }
}

fn guess_mime_type(url: &str) -> &'static str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let extension = path
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        _ => "image/jpeg",
    }
}

/// 遷移完了の通知
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationComplete {
    /// 遷移したページ（タブ）の識別子
    pub target_id: String,
}

/// ページ自動化アダプター
///
/// どのメソッドのエラーも、現在の実行を停止させます。
#[async_trait]
pub trait PageAdapter: Send + Sync {
    /// 操作対象のページ（タブ）の識別子
    fn target_id(&self) -> &str;

    /// 現在のページに表示されているデザイン画像を取得する
    async fn locate_active_image(&self) -> Result<ImageData, AdapterError>;

    /// 次のデザインの画像を取得する（残っていなければ `None`）
    async fn locate_next_image(&self) -> Result<Option<ImageData>, AdapterError>;

    /// メタデータをフォームに入力する
    async fn fill_form(&self, record: &MetadataRecord, settings: &Settings) -> Result<(), AdapterError>;

    /// 次のデザインへの遷移を要求する
    ///
    /// 完了は [`NavigationComplete`] で通知されます。
    async fn advance_to_next_item(&self) -> Result<(), AdapterError>;

    /// 入力済みのデザインをすべて公開する
    async fn publish_all(&self) -> Result<(), AdapterError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_type_from_extension() {
        assert_eq!(ImageData::new("a/b/design.PNG", vec![]).mime_type, "image/png");
        assert_eq!(
            ImageData::new("https://cdn.example.com/x.webp?w=300", vec![]).mime_type,
            "image/webp"
        );
        assert_eq!(ImageData::new("blob:abc", vec![]).mime_type, "image/jpeg");
    }

    #[test]
    fn test_data_url() {
        let image = ImageData::new("x.png", b"hi".to_vec());
        assert_eq!(image.base64(), "aGk=");
        assert_eq!(image.data_url(), "data:image/png;base64,aGk=");
    }
}
