//! ワークフロー実行エンジン
//!
//! # 責務
//!
//! - 「メタデータ生成 → フォーム入力 → 次のデザインへ」の実行制御
//! - 自動処理（autoflow）での先読み・遷移待ち・待機時間の制御
//! - 表示層へのイベント通知と実行結果の記録
//!
//! # モジュール構成
//!
//! - [`orchestrator`][]: オーケストレーター本体とコマンド受付
//! - [`state`][]: 実行状態（フェーズ・モード・先読みハンドル・カウンター）
//! - [`pacing`][]: デザイン間の待機時間
//! - [`events`][]: 表示層へのイベント
//! - [`result`][]: 実行結果の型

pub mod orchestrator;
pub mod state;
pub mod pacing;
pub mod events;
pub mod result;

// 公開APIの再エクスポート
pub use orchestrator::{Command, FlowHandle, Orchestrator, StartRequest};
pub use state::{RunCounters, RunMode, RunPhase, RunState};
pub use pacing::PacingDelay;
pub use events::{EventSink, FlowEvent};
pub use result::{RunOutcome, RunSummary};
