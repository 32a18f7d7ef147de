//! 画像ディレクトリを対象にしたアダプター
//!
//! ディレクトリ内の画像ファイルをファイル名順に 1 件ずつ「ページ」として扱います。
//!
//! | 操作 | 動作 |
//! |------|------|
//! | フォーム入力 | 出力ディレクトリに `<画像名>.json` を書き出す |
//! | 次へ進む | 現在位置を 1 つ進め、[`NavigationComplete`] を送る |
//! | 公開 | 入力済みのファイル一覧を `published.json` に書き出す |

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::config::Settings;
use crate::error::AdapterError;
use crate::metadata::MetadataRecord;

use super::{ImageData, NavigationComplete, PageAdapter};

/// 画像として扱う拡張子
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "gif"];

/// 公開マニフェストのファイル名
pub const MANIFEST_FILE: &str = "published.json";

/// 画像ディレクトリのアダプター
pub struct DirectoryAdapter {
    target_id: String,
    images: Vec<PathBuf>,
    out_dir: PathBuf,
    navigation: mpsc::UnboundedSender<NavigationComplete>,
    state: Mutex<Progress>,
}

#[derive(Debug, Default)]
struct Progress {
    position: usize,
    filled: Vec<String>,
}

/// 1 件分のフォーム入力内容
#[derive(Debug, Serialize)]
struct FormEntry<'a> {
    image: &'a str,
    #[serde(flatten)]
    record: &'a MetadataRecord,
    tags: String,
    enable_kids: bool,
    mature_content: bool,
    product_colors: &'a str,
}

#[derive(Debug, Serialize)]
struct Manifest<'a> {
    published: &'a [String],
}

impl DirectoryAdapter {
    /// 画像ディレクトリを走査してアダプターを作る
    pub fn open(
        images_dir: impl AsRef<Path>,
        out_dir: impl Into<PathBuf>,
        navigation: mpsc::UnboundedSender<NavigationComplete>,
    ) -> Result<Self, AdapterError> {
        let images_dir = images_dir.as_ref();
        let mut images = Vec::new();
        for entry in std::fs::read_dir(images_dir)? {
            let path = entry?.path();
            if path.is_file() && is_image(&path) {
                images.push(path);
            }
        }
        images.sort();

        if images.is_empty() {
            return Err(AdapterError::NotFound(format!(
                "{} に画像がありません",
                images_dir.display()
            )));
        }
        info!(dir = %images_dir.display(), count = images.len(), "design images found");

        Ok(Self {
            target_id: format!("dir:{}", images_dir.display()),
            images,
            out_dir: out_dir.into(),
            navigation,
            state: Mutex::new(Progress::default()),
        })
    }

    /// 画像の総数
    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut Progress) -> T) -> Result<T, AdapterError> {
        let mut state = self
            .state
            .lock()
            .map_err(|e| {
                AdapterError::Io(std::io::Error::other(format!("進行状況のロックが壊れています: {e}")))
            })?;
        Ok(f(&mut state))
    }

    async fn load(&self, index: usize) -> Result<ImageData, AdapterError> {
        let path = self
            .images
            .get(index)
            .ok_or_else(|| AdapterError::NotFound(format!("{} 番目のデザイン", index + 1)))?;
        let bytes = tokio::fs::read(path).await?;
        Ok(ImageData::new(path.display().to_string(), bytes))
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

#[async_trait]
impl PageAdapter for DirectoryAdapter {
    fn target_id(&self) -> &str {
        &self.target_id
    }

    async fn locate_active_image(&self) -> Result<ImageData, AdapterError> {
        let position = self.with_state(|s| s.position)?;
        self.load(position).await
    }

    async fn locate_next_image(&self) -> Result<Option<ImageData>, AdapterError> {
        let next = self.with_state(|s| s.position + 1)?;
        if next >= self.images.len() {
            return Ok(None);
        }
        self.load(next).await.map(Some)
    }

    async fn fill_form(&self, record: &MetadataRecord, settings: &Settings) -> Result<(), AdapterError> {
        let position = self.with_state(|s| s.position)?;
        let image = self
            .images
            .get(position)
            .ok_or_else(|| AdapterError::FillRejected("入力対象のデザインがありません".to_string()))?;
        let stem = image
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| AdapterError::FillRejected(format!("不正なファイル名: {}", image.display())))?;

        let entry = FormEntry {
            image: stem,
            record,
            tags: record.tags_line(),
            enable_kids: settings.enable_kids(),
            mature_content: settings.mature_content(),
            product_colors: settings.product_colors(),
        };
        let json = serde_json::to_string_pretty(&entry)
            .map_err(|e| AdapterError::FillRejected(e.to_string()))?;

        tokio::fs::create_dir_all(&self.out_dir).await?;
        let file_name = format!("{stem}.json");
        tokio::fs::write(self.out_dir.join(&file_name), json).await?;
        debug!(file = %file_name, "form written");

        self.with_state(|s| {
            if !s.filled.contains(&file_name) {
                s.filled.push(file_name);
            }
        })
    }

    async fn advance_to_next_item(&self) -> Result<(), AdapterError> {
        let total = self.images.len();
        self.with_state(|s| {
            if s.position + 1 >= total {
                return Err(AdapterError::NavigationFailed("次のデザインがありません".to_string()));
            }
            s.position += 1;
            Ok(())
        })??;

        self.navigation
            .send(NavigationComplete {
                target_id: self.target_id.clone(),
            })
            .map_err(|_| AdapterError::ConnectionLost("navigation listener closed".to_string()))
    }

    async fn publish_all(&self) -> Result<(), AdapterError> {
        let filled = self.with_state(|s| s.filled.clone())?;
        if filled.is_empty() {
            return Err(AdapterError::PublishFailed("入力済みのデザインがありません".to_string()));
        }

        let json = serde_json::to_string_pretty(&Manifest { published: &filled })
            .map_err(|e| AdapterError::PublishFailed(e.to_string()))?;
        tokio::fs::create_dir_all(&self.out_dir).await?;
        tokio::fs::write(self.out_dir.join(MANIFEST_FILE), json).await?;
        info!(count = filled.len(), "designs published");
        Ok(())
    }
}
