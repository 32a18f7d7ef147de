//! 認証情報ローテーションの台帳
//!
//! # 責務
//!
//! - プロバイダーごとの API キー一覧と、次に使うキーを指すカーソルを管理
//! - カーソルを [`CursorStore`] 経由で永続化し、実行をまたいで引き継ぐ
//!
//! # 不変条件
//!
//! カーソルは常に `[0, len]` の範囲に収まります。保存値が `len` を超えていた場合は
//! 読み込み時に `len` に丸めます。`cursor == len` は「すべて失敗済み」を意味し、
//! 次の実行開始時に [`CredentialLedger::reset_if_exhausted`] で 0 に戻ります。

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::ProviderKind;
use crate::error::LedgerError;

/// カーソルの永続化先
pub trait CursorStore: Send + Sync {
    /// 保存済みのカーソルを返す（未保存なら 0）
    fn load(&self, provider: ProviderKind) -> Result<usize, LedgerError>;

    fn save(&self, provider: ProviderKind, cursor: usize) -> Result<(), LedgerError>;
}

/// メモリ上のカーソルストア
#[derive(Debug, Default)]
pub struct MemoryCursorStore {
    cursors: Mutex<BTreeMap<ProviderKind, usize>>,
}

impl MemoryCursorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CursorStore for MemoryCursorStore {
    fn load(&self, provider: ProviderKind) -> Result<usize, LedgerError> {
        let cursors = self
            .cursors
            .lock()
            .map_err(|e| LedgerError::Unavailable(e.to_string()))?;
        Ok(cursors.get(&provider).copied().unwrap_or(0))
    }

    fn save(&self, provider: ProviderKind, cursor: usize) -> Result<(), LedgerError> {
        let mut cursors = self
            .cursors
            .lock()
            .map_err(|e| LedgerError::Unavailable(e.to_string()))?;
        cursors.insert(provider, cursor);
        Ok(())
    }
}

/// TOML ファイルに保存するカーソルストア
///
/// ```toml
/// [cursors]
/// gemini = 2
/// ```
#[derive(Debug, Clone)]
pub struct FileCursorStore {
    path: PathBuf,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CursorFile {
    #[serde(default)]
    cursors: BTreeMap<String, usize>,
}

impl FileCursorStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<CursorFile, LedgerError> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => Ok(toml::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(CursorFile::default()),
            Err(e) => Err(e.into()),
        }
    }
}

impl CursorStore for FileCursorStore {
    fn load(&self, provider: ProviderKind) -> Result<usize, LedgerError> {
        Ok(self
            .read()?
            .cursors
            .get(provider.as_str())
            .copied()
            .unwrap_or(0))
    }

    fn save(&self, provider: ProviderKind, cursor: usize) -> Result<(), LedgerError> {
        let mut file = self.read()?;
        file.cursors.insert(provider.as_str().to_string(), cursor);

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, toml::to_string(&file)?)?;
        Ok(())
    }
}

/// 1 プロバイダー分の認証情報台帳
#[derive(Clone)]
pub struct CredentialLedger {
    provider: ProviderKind,
    credentials: Vec<String>,
    store: Arc<dyn CursorStore>,
}

impl std::fmt::Debug for CredentialLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // キーそのものはログに出さない
        f.debug_struct("CredentialLedger")
            .field("provider", &self.provider)
            .field("credentials", &self.credentials.len())
            .finish()
    }
}

impl CredentialLedger {
    pub fn new(provider: ProviderKind, credentials: Vec<String>, store: Arc<dyn CursorStore>) -> Self {
        Self {
            provider,
            credentials,
            store,
        }
    }

    pub fn provider(&self) -> ProviderKind {
        self.provider
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    /// 現在のカーソル（`[0, len]` に丸めた値）
    pub fn cursor(&self) -> Result<usize, LedgerError> {
        Ok(self.store.load(self.provider)?.min(self.len()))
    }

    pub fn credential(&self, index: usize) -> Option<&str> {
        self.credentials.get(index).map(String::as_str)
    }

    /// `from` の次の認証情報へカーソルを進めて保存する
    pub fn advance(&self, from: usize) -> Result<usize, LedgerError> {
        let next = (from + 1).min(self.len());
        self.store.save(self.provider, next)?;
        debug!(provider = %self.provider, cursor = next, "credential cursor advanced");
        Ok(next)
    }

    pub fn reset(&self) -> Result<(), LedgerError> {
        self.store.save(self.provider, 0)
    }

    /// すべて失敗済み（`cursor == len`）なら先頭に戻す
    ///
    /// 戻した場合は `true` を返します。
    pub fn reset_if_exhausted(&self) -> Result<bool, LedgerError> {
        if self.cursor()? < self.len() {
            return Ok(false);
        }
        self.reset()?;
        info!(provider = %self.provider, "credential cursor reset to the first key");
        Ok(true)
    }

    /// [`cursor`](Self::cursor) をブロッキングスレッドで読む
    pub async fn load_cursor(&self) -> Result<usize, LedgerError> {
        self.blocking(|ledger| ledger.cursor()).await
    }

    /// [`advance`](Self::advance) をブロッキングスレッドで保存する
    pub async fn commit_advance(&self, from: usize) -> Result<usize, LedgerError> {
        self.blocking(move |ledger| ledger.advance(from)).await
    }

    /// [`reset`](Self::reset) をブロッキングスレッドで保存する
    pub async fn commit_reset(&self) -> Result<(), LedgerError> {
        self.blocking(|ledger| ledger.reset()).await
    }

    /// ストアの同期 I/O を非同期ランタイムのワーカーから外して実行する
    async fn blocking<T, F>(&self, f: F) -> Result<T, LedgerError>
    where
        T: Send + 'static,
        F: FnOnce(&CredentialLedger) -> Result<T, LedgerError> + Send + 'static,
    {
        let ledger = self.clone();
        tokio::task::spawn_blocking(move || f(&ledger))
            .await
            .map_err(|e| LedgerError::Unavailable(e.to_string()))?
    }
}
