//! ワークフローオーケストレーター
//!
//! # 責務
//!
//! - 「メタデータ生成 → フォーム入力 → 次のデザインへ」の 1 サイクルを実行
//! - 自動処理（autoflow）では、遷移と並行して次のデザインのメタデータを先読み
//! - 開始・停止コマンドの受け付けと、停止時の後始末
//!
//! # 実行の流れ
//!
//! 1. 現在のデザイン画像を取得し、プレビューを通知
//! 2. 先読みの結果があればそれを使い、なければパイプラインを同期的に呼ぶ
//! 3. 設定で固定された色を上書きし、色を再検証してフォームに入力
//! 4. 自動処理で残りがあれば、次の画像の先読みを開始して遷移を要求し、
//!    遷移完了を待ってから待機時間だけ休む（1 に戻る）
//! 5. 残りがなければ、設定に応じて公開して終了
//!
//! どの段階のエラーも実行を中断し、失敗通知を 1 行だけ出して停止します。
//!
//! # 使用例
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tokio::sync::mpsc;
//! use teeflow::adapter::DirectoryAdapter;
//! use teeflow::config::FileSettings;
//! use teeflow::engine::{EventSink, Orchestrator, RunMode, StartRequest};
//! use teeflow::metadata::MetadataPipeline;
//! use teeflow::provider::FileCursorStore;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (events, _event_rx) = EventSink::channel();
//!     let (nav_tx, nav_rx) = mpsc::unbounded_channel();
//!
//!     let adapter = Arc::new(DirectoryAdapter::open("designs", "out", nav_tx)?);
//!     let pipeline = Arc::new(MetadataPipeline::new(
//!         reqwest::Client::new(),
//!         Arc::new(FileCursorStore::new("ledger.toml")),
//!         events.clone(),
//!     ));
//!     let settings = Arc::new(FileSettings::new("settings.toml"));
//!
//!     let mut orchestrator = Orchestrator::new(adapter, pipeline, settings, nav_rx);
//!     let summary = orchestrator.start(StartRequest::new(RunMode::Autoflow)).await?;
//!     println!("{}", summary.to_json()?);
//!     Ok(())
//! }
//! ```

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::adapter::{NavigationComplete, PageAdapter};
use crate::config::SettingsStore;
use crate::error::{AdapterError, OrchestratorError};
use crate::metadata::{MetadataPipeline, TagHints, validate_colors};

use super::events::{EventSink, FlowEvent};
use super::pacing::PacingDelay;
use super::result::{RunOutcome, RunSummary};
use super::state::{RunCounters, RunMode, RunPhase, RunState};

const ALREADY_RUNNING: &str = "Warning: another process is already running.";

/// コマンドチャネルのバッファ数
const COMMAND_BUFFER: usize = 16;

/// 実行開始の要求
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartRequest {
    pub mode: RunMode,
    /// 処理するデザイン数（自動処理で未指定なら設定の `autoflow_count`）
    pub total_count: Option<u32>,
    pub main_tag_hint: Option<String>,
    pub suggestion_tag_hint: Option<String>,
}

impl StartRequest {
    pub fn new(mode: RunMode) -> Self {
        Self {
            mode,
            total_count: None,
            main_tag_hint: None,
            suggestion_tag_hint: None,
        }
    }

    pub fn with_count(mut self, count: u32) -> Self {
        self.total_count = Some(count);
        self
    }

    pub fn with_hints(mut self, hints: TagHints) -> Self {
        self.main_tag_hint = hints.main_tag;
        self.suggestion_tag_hint = hints.suggestion_tag;
        self
    }
}

/// オーケストレーターへのコマンド
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start(StartRequest),
    Stop,
}

/// 表示層からオーケストレーターを操作するためのハンドル
#[derive(Debug, Clone)]
pub struct FlowHandle {
    tx: mpsc::Sender<Command>,
}

impl FlowHandle {
    /// ハンドルと、[`Orchestrator::serve`] に渡す受信側を作る
    pub fn channel() -> (Self, mpsc::Receiver<Command>) {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        (Self { tx }, rx)
    }

    pub async fn start_generation(
        &self,
        mode: RunMode,
        count: Option<u32>,
        hints: TagHints,
    ) -> Result<(), OrchestratorError> {
        let mut request = StartRequest::new(mode).with_hints(hints);
        request.total_count = count;
        self.send(Command::Start(request)).await
    }

    pub async fn stop_process(&self) -> Result<(), OrchestratorError> {
        self.send(Command::Stop).await
    }

    async fn send(&self, command: Command) -> Result<(), OrchestratorError> {
        self.tx
            .send(command)
            .await
            .map_err(|_| OrchestratorError::Closed)
    }
}

/// 実行中に使う協調オブジェクト
struct Collaborators {
    adapter: Arc<dyn PageAdapter>,
    pipeline: Arc<MetadataPipeline>,
    events: EventSink,
    navigation: mpsc::UnboundedReceiver<NavigationComplete>,
}

/// ワークフローオーケストレーター
///
/// 同時に実行できるのは 1 回だけで、排他はフェーズ [`RunPhase`] で判定します。
pub struct Orchestrator {
    settings: Arc<dyn SettingsStore>,
    parts: Collaborators,
    phase: RunPhase,
    run: Option<RunState>,
}

impl Orchestrator {
    /// オーケストレーターを作る
    ///
    /// `navigation` はアダプターが [`NavigationComplete`] を送るチャネルの受信側です。
    /// イベントはパイプラインと同じ [`EventSink`] に送られます。
    pub fn new(
        adapter: Arc<dyn PageAdapter>,
        pipeline: Arc<MetadataPipeline>,
        settings: Arc<dyn SettingsStore>,
        navigation: mpsc::UnboundedReceiver<NavigationComplete>,
    ) -> Self {
        let events = pipeline.events().clone();
        Self {
            settings,
            parts: Collaborators {
                adapter,
                pipeline,
                events,
                navigation,
            },
            phase: RunPhase::Idle,
            run: None,
        }
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn is_running(&self) -> bool {
        self.phase.is_running()
    }

    /// 実行を開始し、停止するまで進める
    ///
    /// 別の実行が進行中なら [`OrchestratorError::AlreadyRunning`] を返します。
    /// 実行中のエラーは `Err` ではなく [`RunOutcome::Failed`] として要約に入ります。
    pub async fn start(&mut self, request: StartRequest) -> Result<RunSummary, OrchestratorError> {
        self.begin(request)?;

        let outcome = match self.drive().await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(error = %e, "run failed");
                RunOutcome::Failed(e.user_message())
            }
        };
        Ok(self.finish(outcome))
    }

    /// 実行を停止する
    ///
    /// 実行中でなければ何もしません。先読みタスクは待たずに中断します。
    pub fn stop(&mut self, outcome: RunOutcome) -> Option<RunSummary> {
        if !self.phase.is_running() {
            debug!("stop requested while idle");
            return None;
        }
        Some(self.finish(outcome))
    }

    /// コマンドを受け付けるループ
    ///
    /// 実行中もコマンドを監視し、停止コマンドは進行中の処理より優先します
    /// （実行中の future を drop してから [`Orchestrator::stop`] を呼ぶ）。
    /// 実行中の開始コマンドは警告を出して無視します。
    /// コマンドチャネルが閉じたら、進行中の実行を最後まで進めてから戻ります。
    pub async fn serve(mut self, mut commands: mpsc::Receiver<Command>) -> Self {
        while let Some(command) = commands.recv().await {
            let request = match command {
                Command::Start(request) => request,
                Command::Stop => {
                    self.stop(RunOutcome::Cancelled);
                    continue;
                }
            };

            let events = self.parts.events.clone();
            let report = |result: Result<RunSummary, OrchestratorError>| match result {
                Ok(summary) => debug!(outcome = ?summary.outcome, "run finished"),
                Err(e) => warn!(error = %e, "run was not started"),
            };

            let mut cancelled = false;
            {
                let run = self.start(request);
                tokio::pin!(run);
                loop {
                    tokio::select! {
                        result = &mut run => {
                            report(result);
                            break;
                        }
                        command = commands.recv() => match command {
                            Some(Command::Start(_)) => events.warn(ALREADY_RUNNING),
                            Some(Command::Stop) => {
                                cancelled = true;
                                break;
                            }
                            None => {
                                report((&mut run).await);
                                break;
                            }
                        },
                    }
                }
            }

            if cancelled {
                self.stop(RunOutcome::Cancelled);
            }
        }
        self
    }

    fn begin(&mut self, request: StartRequest) -> Result<(), OrchestratorError> {
        let events = &self.parts.events;
        if self.phase.is_running() {
            events.warn(ALREADY_RUNNING);
            return Err(OrchestratorError::AlreadyRunning);
        }

        let settings = match self.settings.snapshot() {
            Ok(settings) => Arc::new(settings),
            Err(e) => {
                events.warn(format!("Could not load settings: {e}"));
                return Err(e.into());
            }
        };
        if let Err(e) = self.parts.pipeline.prepare_run(&settings) {
            events.warn(format!("Could not prepare API keys: {e}"));
            return Err(e.into());
        }

        let hints = TagHints::new(
            request.main_tag_hint.as_deref(),
            request.suggestion_tag_hint.as_deref(),
        );
        let total_count = request.total_count.unwrap_or(settings.autoflow_count());

        // 前回の実行の残り（先読みを含む）はここで破棄される
        self.run = Some(RunState::new(request.mode, total_count, hints, settings));
        self.phase = RunPhase::Processing;
        events.emit(FlowEvent::RunStarted(request.mode));
        Ok(())
    }

    async fn drive(&mut self) -> Result<RunOutcome, OrchestratorError> {
        let Some(run) = self.run.as_mut() else {
            return Ok(RunOutcome::Cancelled);
        };

        loop {
            self.phase = RunPhase::Processing;
            self.parts.process_item(run).await?;

            if !run.has_remaining() {
                break;
            }
            self.parts.advance(run).await?;

            self.phase = RunPhase::Pacing;
            self.parts.pace(run).await;
        }

        self.parts.conclude(run).await
    }

    fn finish(&mut self, outcome: RunOutcome) -> RunSummary {
        let run = self.run.take();
        self.phase = match outcome {
            RunOutcome::Cancelled | RunOutcome::Failed(_) => RunPhase::Stopped,
            _ => RunPhase::Completed,
        };

        self.parts
            .events
            .log(format!("--- {} ---", outcome.final_message()));
        self.parts.events.emit(FlowEvent::RunStopped);

        let end_time = SystemTime::now();
        let (mode, total_count, counters, start_time) = match &run {
            Some(run) => (run.mode(), run.total_count(), run.counters(), run.started_at()),
            None => (RunMode::Single, 0, RunCounters::default(), end_time),
        };

        RunSummary {
            mode,
            outcome,
            total_count,
            counters,
            start_time,
            end_time,
            duration: end_time.duration_since(start_time).unwrap_or_default(),
        }
    }
}

impl Collaborators {
    /// 1 件分の「生成 → 入力」
    async fn process_item(&mut self, run: &mut RunState) -> Result<(), OrchestratorError> {
        let settings = run.settings().clone();
        let index = run.begin_item();
        match run.mode() {
            RunMode::Autoflow => self
                .events
                .log(format!("Processing design {index}/{}...", run.total_count())),
            RunMode::Single => self.events.log("Starting single process..."),
        }

        self.events.log("Looking for the design image...");
        let image = self.adapter.locate_active_image().await?;
        self.events.log("Image found. Showing preview...");
        self.events.emit(FlowEvent::PreviewReady(image.url.clone()));

        // 待機中に停止されても、ハンドルは RunState に残り破棄時に中断される
        let prefetched = match run.prefetch_mut() {
            Some(handle) => {
                self.events.log("Using prepared metadata...");
                Some(handle.await)
            }
            None => None,
        };
        run.take_prefetch();

        let mut record = match prefetched {
            Some(Ok(record)) => {
                run.counters_mut().prefetch_hits += 1;
                record
            }
            Some(Err(e)) => {
                warn!(error = %e, "prefetch task failed");
                self.events
                    .warn("Prepared metadata was lost. Generating metadata again...");
                self.pipeline.generate(&settings, &image, run.hints()).await
            }
            None => {
                self.events.log("Generating metadata from AI...");
                self.pipeline.generate(&settings, &image, run.hints()).await
            }
        };
        run.counters_mut().processed += 1;

        for (category, color) in settings.color_overrides() {
            record.colors.insert(category, color.to_string());
        }
        validate_colors(&mut record);

        self.events.log("Filling the form...");
        self.adapter.fill_form(&record, &settings).await?;
        run.counters_mut().form_fills += 1;
        self.events.log("Form filled successfully.");
        Ok(())
    }

    /// 次のデザインの先読みを始め、遷移を要求して完了を待つ
    async fn advance(&mut self, run: &mut RunState) -> Result<(), OrchestratorError> {
        let settings = run.settings().clone();
        self.events.log(format!(
            "Design {} done. Preparing the next design...",
            run.current_index()
        ));

        if let Some(next) = self.adapter.locate_next_image().await? {
            self.events
                .log("Next image found. Generating its metadata in the background...");
            let pipeline = self.pipeline.clone();
            let prefetch_settings = settings.clone();
            let hints = run.hints().clone();
            run.set_prefetch(tokio::spawn(async move {
                pipeline.generate(&prefetch_settings, &next, &hints).await
            }));
        }

        // 前回の遷移の通知が残っていれば捨てる
        while self.navigation.try_recv().is_ok() {}

        self.events.log("Moving to the next design...");
        self.adapter.advance_to_next_item().await?;
        self.wait_for_navigation(settings.navigation_timeout()).await?;
        run.counters_mut().navigations += 1;
        Ok(())
    }

    /// 対象ページの遷移完了通知を待つ
    async fn wait_for_navigation(&mut self, limit: Duration) -> Result<(), AdapterError> {
        let target = self.adapter.target_id().to_string();
        let navigation = &mut self.navigation;

        let wait = async {
            loop {
                match navigation.recv().await {
                    Some(signal) if signal.target_id == target => return Ok(()),
                    Some(signal) => debug!(target_id = %signal.target_id, "ignoring navigation of another page"),
                    None => {
                        return Err(AdapterError::NavigationFailed(
                            "遷移通知のチャネルが閉じています".to_string(),
                        ));
                    }
                }
            }
        };

        match tokio::time::timeout(limit, wait).await {
            Ok(result) => result,
            Err(_) => Err(AdapterError::NavigationTimeout {
                secs: limit.as_secs(),
            }),
        }
    }

    /// 次のデザインに移る前の待機
    async fn pace(&mut self, run: &mut RunState) {
        let delay = run.settings().autoflow_delay();
        let duration = delay.sample();
        let secs = duration.as_secs();
        match delay {
            PacingDelay::Random => self.events.log(format!("Random delay: {secs} seconds")),
            PacingDelay::Fixed(_) => self.events.log(format!("Fixed delay: {secs} seconds")),
        }

        if !duration.is_zero() {
            self.events
                .log(format!("Waiting {secs} seconds before continuing..."));
            tokio::time::sleep(duration).await;
        }
        run.counters_mut().pacing_delays += 1;
    }

    /// 最後のデザインを処理した後の締めくくり
    async fn conclude(&mut self, run: &mut RunState) -> Result<RunOutcome, OrchestratorError> {
        match run.mode() {
            RunMode::Single => Ok(RunOutcome::Completed),
            RunMode::Autoflow if run.settings().auto_publish() => {
                self.events.log("Autoflow finished. Publishing all designs...");
                self.adapter.publish_all().await?;
                run.counters_mut().published = true;
                Ok(RunOutcome::Published)
            }
            RunMode::Autoflow => Ok(RunOutcome::AwaitingPublish),
        }
    }
}
