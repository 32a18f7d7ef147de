//! 実行状態の管理
//!
//! # 責務
//!
//! - オーケストレーターのフェーズ [`RunPhase`] と実行モード [`RunMode`] の定義
//! - 1 回の実行（開始から停止まで）の状態 [`RunState`] を保持
//! - 先読みタスクのハンドルと実行カウンター [`RunCounters`] の管理
//!
//! [`RunState`] は 1 つのオーケストレーターだけが所有し、停止時に破棄されます。
//! 先読みタスクのハンドルは破棄されても中断されず、結果が捨てられるだけです。

use std::sync::Arc;
use std::time::SystemTime;

use serde::Serialize;
use tokio::task::JoinHandle;

use crate::config::Settings;
use crate::metadata::{MetadataRecord, TagHints};

/// 実行モード
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// 現在のデザイン 1 件だけを処理
    Single,
    /// 複数のデザインを連続で処理
    Autoflow,
}

/// オーケストレーターのフェーズ
///
/// ```text
/// Idle → Processing → {Pacing → Processing}* → Completed | Stopped
/// ```
///
/// `Completed` と `Stopped` からは新しい実行を開始できます。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    #[default]
    Idle,
    Processing,
    Pacing,
    Completed,
    Stopped,
}

impl RunPhase {
    /// 実行中（新しい開始要求を拒否する状態）かどうか
    pub fn is_running(&self) -> bool {
        matches!(self, RunPhase::Processing | RunPhase::Pacing)
    }
}

/// 実行カウンター
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunCounters {
    /// メタデータを生成したデザイン数
    pub processed: u32,
    pub form_fills: u32,
    pub navigations: u32,
    pub pacing_delays: u32,
    /// 先読みの結果を使った回数
    pub prefetch_hits: u32,
    pub published: bool,
}

/// 1 回の実行の状態
#[derive(Debug)]
pub struct RunState {
    mode: RunMode,
    total_count: u32,
    current_index: u32,
    hints: TagHints,
    settings: Arc<Settings>,
    prefetch: Option<JoinHandle<MetadataRecord>>,
    counters: RunCounters,
    started_at: SystemTime,
}

impl RunState {
    /// 実行状態を作る
    ///
    /// 単発実行では `total_count` は常に 1 になります。
    pub fn new(mode: RunMode, total_count: u32, hints: TagHints, settings: Arc<Settings>) -> Self {
        let total_count = match mode {
            RunMode::Single => 1,
            RunMode::Autoflow => total_count.max(1),
        };
        Self {
            mode,
            total_count,
            current_index: 0,
            hints,
            settings,
            prefetch: None,
            counters: RunCounters::default(),
            started_at: SystemTime::now(),
        }
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    pub fn total_count(&self) -> u32 {
        self.total_count
    }

    /// 処理中のデザインの番号（1 始まり、開始前は 0）
    pub fn current_index(&self) -> u32 {
        self.current_index
    }

    pub fn hints(&self) -> &TagHints {
        &self.hints
    }

    pub fn settings(&self) -> &Arc<Settings> {
        &self.settings
    }

    pub fn counters(&self) -> RunCounters {
        self.counters
    }

    pub fn counters_mut(&mut self) -> &mut RunCounters {
        &mut self.counters
    }

    pub fn started_at(&self) -> SystemTime {
        self.started_at
    }

    /// 次のデザインに進み、その番号を返す
    pub fn begin_item(&mut self) -> u32 {
        self.current_index += 1;
        self.current_index
    }

    /// 自動処理でまだ処理すべきデザインが残っているか
    pub fn has_remaining(&self) -> bool {
        self.mode == RunMode::Autoflow && self.current_index < self.total_count
    }

    /// 先読みタスクを登録する（既存のタスクは中断される）
    pub fn set_prefetch(&mut self, handle: JoinHandle<MetadataRecord>) {
        if let Some(stale) = self.prefetch.replace(handle) {
            stale.abort();
        }
    }

    /// 先読みタスクを状態に残したまま参照する
    ///
    /// 待機中に実行が破棄されても、ハンドルは状態側に残るため
    /// [`Drop`] で中断されます。
    pub fn prefetch_mut(&mut self) -> Option<&mut JoinHandle<MetadataRecord>> {
        self.prefetch.as_mut()
    }

    /// 先読みタスクを取り出す（状態からは消える）
    pub fn take_prefetch(&mut self) -> Option<JoinHandle<MetadataRecord>> {
        self.prefetch.take()
    }

    pub fn has_prefetch(&self) -> bool {
        self.prefetch.is_some()
    }
}

/// 実行状態の破棄とともに、未完了の先読みタスクを中断する
impl Drop for RunState {
    fn drop(&mut self) {
        if let Some(handle) = self.prefetch.take() {
            handle.abort();
        }
    }
}
