//! teeflow - デザイン出品の自動化ワークフロー
//!
//! 「AI でメタデータを生成 → フォームに入力 → 次のデザインへ」を
//! 1 件ずつ、または複数件連続（autoflow）で実行します。
//!
//! # モジュール構成
//!
//! - [`engine`] - ワークフローオーケストレーター
//! - [`metadata`] - メタデータ生成パイプライン（プロンプト・パース・色検証・禁止語フィルター）
//! - [`provider`] - AI プロバイダークライアントと認証情報のフェイルオーバー
//! - [`adapter`] - ページ自動化アダプター
//! - [`config`] - 設定
//! - [`error`] - エラー型
//! - [`telemetry`] - ログ出力

pub mod adapter;
pub mod config;
pub mod engine;
pub mod error;
pub mod metadata;
pub mod provider;
pub mod telemetry;
