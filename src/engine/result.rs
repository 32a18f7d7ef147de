//! 実行結果の型定義
//!
//! # 責務
//!
//! - 実行の結末 [`RunOutcome`] の型定義
//! - 実行結果の要約 [`RunSummary`] の型定義（JSON 出力対応）
//!
//! # 使用例
//!
//! ```rust,no_run
//! use teeflow::engine::result::RunSummary;
//!
//! fn handle_summary(summary: RunSummary) {
//!     if summary.is_success() {
//!         println!("処理したデザイン: {}", summary.counters.processed);
//!         println!("実行時間: {:?}", summary.duration);
//!     } else {
//!         println!("失敗: {:?}", summary.outcome);
//!     }
//!
//!     if let Ok(json) = summary.to_json() {
//!         println!("JSON: {}", json);
//!     }
//! }
//! ```

use std::time::{Duration, SystemTime};

use serde::Serialize;

use super::state::{RunCounters, RunMode};

/// 実行の結末
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum RunOutcome {
    /// 単発実行が完了した
    Completed,
    /// 自動処理の後、すべてのデザインを公開した
    Published,
    /// 自動処理が完了した（公開は手動）
    AwaitingPublish,
    /// ユーザーが停止した
    Cancelled,
    /// エラーで中断した
    Failed(String),
}

impl RunOutcome {
    /// 停止時に出す最終メッセージ（`--- ... ---` の中身）
    pub fn final_message(&self) -> String {
        match self {
            RunOutcome::Completed => "Single process completed successfully.".to_string(),
            RunOutcome::Published => "All designs have been published successfully.".to_string(),
            RunOutcome::AwaitingPublish => {
                "Autoflow finished. You can publish the designs manually.".to_string()
            }
            RunOutcome::Cancelled => "Process stopped by user.".to_string(),
            RunOutcome::Failed(message) => format!("PROCESS FAILED: {message}"),
        }
    }
}

/// 実行結果の要約
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub mode: RunMode,

    pub outcome: RunOutcome,

    /// 要求されたデザイン数
    pub total_count: u32,

    pub counters: RunCounters,

    pub start_time: SystemTime,

    pub end_time: SystemTime,

    pub duration: Duration,
}

impl RunSummary {
    /// 結果をJSON形式でシリアライズ
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// 最後まで処理できたかどうか
    ///
    /// 停止・失敗以外の結末が成功です。
    pub fn is_success(&self) -> bool {
        matches!(
            self.outcome,
            RunOutcome::Completed | RunOutcome::Published | RunOutcome::AwaitingPublish
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(outcome: RunOutcome) -> RunSummary {
        RunSummary {
            mode: RunMode::Autoflow,
            outcome,
            total_count: 3,
            counters: RunCounters {
                processed: 3,
                form_fills: 3,
                navigations: 2,
                pacing_delays: 2,
                prefetch_hits: 2,
                published: false,
            },
            start_time: SystemTime::now(),
            end_time: SystemTime::now(),
            duration: Duration::from_secs(12),
        }
    }

    #[test]
    fn test_summary_is_success() {
        assert!(summary(RunOutcome::AwaitingPublish).is_success());
        assert!(summary(RunOutcome::Published).is_success());
        assert!(!summary(RunOutcome::Cancelled).is_success());
        assert!(!summary(RunOutcome::Failed("x".to_string())).is_success());
    }

    #[test]
    fn test_summary_to_json() {
        let json = summary(RunOutcome::Failed("boom".to_string())).to_json().unwrap();

        assert!(json.contains("\"mode\": \"autoflow\""));
        assert!(json.contains("\"status\": \"failed\""));
        assert!(json.contains("boom"));
        assert!(json.contains("\"navigations\": 2"));
    }

    #[test]
    fn test_final_messages() {
        assert_eq!(
            RunOutcome::Failed("page missing".to_string()).final_message(),
            "PROCESS FAILED: page missing"
        );
        assert_eq!(RunOutcome::Cancelled.final_message(), "Process stopped by user.");
    }
}
