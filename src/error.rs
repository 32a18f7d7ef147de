//! エラー型の定義
//!
//! このモジュールは、teeflow 全体で使用されるエラー型を定義します。
//!
//! | 型 | 発生源 | オーケストレーターへの影響 |
//! |----|--------|--------------------------|
//! | [`ConfigError`] | 設定ファイル | 実行開始前に失敗 |
//! | [`LedgerError`] | 認証情報カーソルの永続化 | プロバイダー呼び出しの失敗として扱う |
//! | [`ProviderError`] | AIプロバイダー | パイプライン内で吸収（デフォルトレコードに置換） |
//! | [`AdapterError`] | ページ自動化アダプター | 実行を停止 |
//! | [`OrchestratorError`] | ワークフロー全体 | 実行を停止 |

use thiserror::Error;

use crate::config::provider::ProviderKind;

/// 設定関連のエラー
#[derive(Debug, Error)]
pub enum ConfigError {
    /// ファイルの読み込みに失敗
    #[error("設定ファイルの読み込みに失敗しました: {0}")]
    FileRead(#[from] std::io::Error),

    /// TOML のデシリアライズに失敗
    #[error("TOML のデシリアライズに失敗しました: {0}")]
    TomlDeserialize(#[from] toml::de::Error),

    /// TOML のシリアライズに失敗
    #[error("TOML のシリアライズに失敗しました: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// バリデーションエラー
    #[error("設定のバリデーションに失敗しました: {0}")]
    Validation(String),
}

/// 認証情報カーソルの永続化エラー
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("カーソルファイルの入出力に失敗しました: {0}")]
    Io(#[from] std::io::Error),

    #[error("カーソルファイルの解析に失敗しました: {0}")]
    TomlDeserialize(#[from] toml::de::Error),

    #[error("カーソルファイルの書き込み形式への変換に失敗しました: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// ストアの内部状態が壊れている（Mutex の poison 等）
    #[error("カーソルストアが利用できません: {0}")]
    Unavailable(String),
}

/// プロバイダーエラーの分類
///
/// [`ErrorClass::Retryable`] の場合のみ、フェイルオーバードライバーが
/// 次の認証情報へローテーションします。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// 認証情報の無効・期限切れ、権限エラー、クォータ超過、レート制限、タイムアウト
    Retryable,
    /// それ以外
    Fatal,
}

/// リトライ可能と判定するエラーメッセージの断片（小文字で比較）
const RETRYABLE_PHRASES: &[&str] = &[
    "api key not valid",
    "api key expired",
    "invalid api key",
    "permission denied",
    "quota",
    "429",
    "rate limit",
    "timeout",
];

/// AIプロバイダー関連のエラー
#[derive(Debug, Error)]
pub enum ProviderError {
    /// APIがエラーを返した（非2xx、またはボディに `error` を含む）
    #[error("{provider} API エラー (HTTP {status}): {message}")]
    Api {
        provider: ProviderKind,
        status: u16,
        message: String,
    },

    /// HTTPリクエストの送信または受信に失敗
    #[error("{provider} へのリクエストに失敗しました: {source}")]
    Request {
        provider: ProviderKind,
        #[source]
        source: reqwest::Error,
    },

    /// タイムアウト
    #[error("Timeout: {provider} API が {secs} 秒以内に応答しませんでした")]
    Timeout { provider: ProviderKind, secs: u64 },

    /// 安全フィルター等によりリクエストがブロックされた
    #[error("リクエストが AI によりブロックされました: {0}")]
    Blocked(String),

    /// 候補テキストが返されなかった
    #[error("{0} から応答が返されませんでした")]
    EmptyResponse(ProviderKind),

    /// 不正なレスポンス
    #[error("不正なレスポンス: {0}")]
    InvalidResponse(String),

    /// 認証情報・モデル設定が見つからない
    #[error("{0} の API キーが設定されていません")]
    MissingCredential(ProviderKind),

    /// すべての認証情報が失敗した
    #[error("{provider} の API キーがすべて失敗しました（{attempted} 件）")]
    CredentialsExhausted {
        provider: ProviderKind,
        attempted: usize,
    },

    /// カーソルの永続化に失敗
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl ProviderError {
    /// エラーを Retryable / Fatal に分類する
    ///
    /// タイムアウトと HTTP 429 は常に Retryable。API エラーとブロックは
    /// プロバイダーが返したメッセージだけを既知の断片（[`RETRYABLE_PHRASES`]）と
    /// 照合します。レスポンス本文の内容では判定しません。
    pub fn class(&self) -> ErrorClass {
        let message = match self {
            ProviderError::Timeout { .. } | ProviderError::Api { status: 429, .. } => {
                return ErrorClass::Retryable;
            }
            ProviderError::Request { source, .. } if source.is_timeout() => return ErrorClass::Retryable,
            ProviderError::Api { message, .. } | ProviderError::Blocked(message) => message,
            _ => return ErrorClass::Fatal,
        };
        let text = message.to_lowercase();
        if RETRYABLE_PHRASES.iter().any(|phrase| text.contains(phrase)) {
            ErrorClass::Retryable
        } else {
            ErrorClass::Fatal
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Retryable
    }
}

/// ページ自動化アダプターのエラー
///
/// いずれも現在の実行にとって致命的です。
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("デザイン画像が見つかりません: {0}")]
    NotFound(String),

    #[error("フォームの入力に失敗しました: {0}")]
    FillRejected(String),

    #[error("次のデザインへの移動に失敗しました: {0}")]
    NavigationFailed(String),

    #[error("ページ遷移の完了通知が {secs} 秒以内に届きませんでした")]
    NavigationTimeout { secs: u64 },

    #[error("公開に失敗しました: {0}")]
    PublishFailed(String),

    /// アダプターとの通信経路が切れた（ページの再読み込みで回復する）
    #[error("Could not establish connection: {0}")]
    ConnectionLost(String),

    #[error("アダプターの入出力に失敗しました: {0}")]
    Io(#[from] std::io::Error),
}

/// ワークフロー実行エラー
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// 別の実行が進行中
    #[error("別の処理が実行中です")]
    AlreadyRunning,

    /// オーケストレーターへのコマンドチャネルが閉じている
    #[error("オーケストレーターが停止しています")]
    Closed,

    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// 接続断時にユーザーへ表示するヒント
pub const RELOAD_HINT: &str = "Could not connect to the page. Try reloading the page.";

impl OrchestratorError {
    /// 停止通知に載せるユーザー向けメッセージ
    ///
    /// アダプターとの接続断だけは生のエラー文ではなく再読み込みのヒントに置き換えます。
    pub fn user_message(&self) -> String {
        match self {
            OrchestratorError::Adapter(AdapterError::ConnectionLost(_)) => RELOAD_HINT.to_string(),
            other => other.to_string(),
        }
    }
}
