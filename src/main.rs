//! teeflow コマンドラインツール
//!
//! ```text
//! teeflow run --images designs --out out --autoflow --count 3
//! teeflow prompt --main-tag cat --suggestion-tag funny
//! teeflow ledger show
//! teeflow ledger reset
//! teeflow config init
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{info, warn};

use teeflow::adapter::DirectoryAdapter;
use teeflow::config::{FileSettings, ProviderKind, Settings, SettingsStore};
use teeflow::engine::{EventSink, FlowEvent, Orchestrator, RunMode, RunOutcome, StartRequest};
use teeflow::error::{AdapterError, ConfigError, LedgerError, OrchestratorError};
use teeflow::metadata::{MetadataPipeline, PromptBuilder, TagHints};
use teeflow::provider::{CredentialLedger, CursorStore, FileCursorStore};
use teeflow::telemetry::{self, TelemetryConfig, TelemetryError};

#[derive(Debug, Parser)]
#[command(name = "teeflow", version, about = "AI でデザインのメタデータを生成し、出品フォームを埋める")]
struct Cli {
    /// 詳細ログ（-v: debug, -vv: trace）
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// 警告以上のログだけを出す
    #[arg(short, long, global = true)]
    quiet: bool,

    /// ログを JSON 形式で出力する
    #[arg(long, global = true)]
    json_logs: bool,

    /// ログをファイルに出力するディレクトリ（日次ローテーション）
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Debug, Subcommand)]
enum CliCommand {
    /// 画像ディレクトリを対象にワークフローを実行する
    Run(RunArgs),
    /// 生成されるプロンプトを表示する
    Prompt(PromptArgs),
    /// API キーのローテーション状態を操作する
    Ledger {
        #[command(subcommand)]
        action: LedgerAction,
    },
    /// 設定ファイルを操作する
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, Args)]
struct SettingsArgs {
    /// 設定ファイル
    #[arg(long, default_value = "teeflow.toml")]
    settings: PathBuf,
}

#[derive(Debug, Args)]
struct LedgerArgs {
    /// API キーのカーソルを保存するファイル
    #[arg(long, default_value = "teeflow-ledger.toml")]
    ledger: PathBuf,
}

#[derive(Debug, Args)]
struct HintArgs {
    /// メインタグのヒント
    #[arg(long)]
    main_tag: Option<String>,

    /// サジェストタグのヒント
    #[arg(long)]
    suggestion_tag: Option<String>,
}

#[derive(Debug, Args)]
struct RunArgs {
    #[command(flatten)]
    settings: SettingsArgs,

    #[command(flatten)]
    ledger: LedgerArgs,

    #[command(flatten)]
    hints: HintArgs,

    /// デザイン画像のディレクトリ
    #[arg(long)]
    images: PathBuf,

    /// フォーム入力結果の出力先
    #[arg(long, default_value = "out")]
    out: PathBuf,

    /// 複数のデザインを連続で処理する
    #[arg(long)]
    autoflow: bool,

    /// 連続処理する件数（省略時は設定の autoflow_count）
    #[arg(long, requires = "autoflow")]
    count: Option<u32>,

    /// 終了時に実行結果を JSON で表示する
    #[arg(long)]
    summary: bool,
}

#[derive(Debug, Args)]
struct PromptArgs {
    #[command(flatten)]
    settings: SettingsArgs,

    #[command(flatten)]
    hints: HintArgs,
}

#[derive(Debug, Subcommand)]
enum LedgerAction {
    /// 現在のカーソル位置を表示する
    Show {
        #[command(flatten)]
        settings: SettingsArgs,

        #[command(flatten)]
        ledger: LedgerArgs,
    },
    /// カーソルを先頭に戻す
    Reset {
        #[command(flatten)]
        ledger: LedgerArgs,

        /// 対象のプロバイダー
        #[arg(long, default_value = "gemini")]
        provider: ProviderKind,
    },
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    /// デフォルト値の設定ファイルを書き出す
    Init {
        #[command(flatten)]
        settings: SettingsArgs,

        /// 既存のファイルを上書きする
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),

    #[error(transparent)]
    Telemetry(#[from] TelemetryError),

    #[error("実行結果の JSON 変換に失敗しました: {0}")]
    Summary(#[from] serde_json::Error),

    #[error("{0} は既に存在します（--force で上書き）")]
    AlreadyExists(PathBuf),

    #[error("処理が完了しませんでした")]
    Unsuccessful,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let telemetry_config = TelemetryConfig {
        level: telemetry::level_from_verbosity(cli.verbose, cli.quiet),
        json: cli.json_logs,
        log_dir: cli.log_dir.clone(),
    };
    let _guard = match telemetry::init(&telemetry_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("エラー: {e}");
            return ExitCode::FAILURE;
        }
    };

    match dispatch(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("エラー: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn dispatch(command: CliCommand) -> Result<(), CliError> {
    match command {
        CliCommand::Run(args) => run(args).await,
        CliCommand::Prompt(args) => prompt(args),
        CliCommand::Ledger { action } => ledger(action),
        CliCommand::Config { action } => config(action),
    }
}

async fn run(args: RunArgs) -> Result<(), CliError> {
    let (events, mut event_rx) = EventSink::channel();
    let (nav_tx, nav_rx) = mpsc::unbounded_channel();

    let adapter = Arc::new(DirectoryAdapter::open(&args.images, &args.out, nav_tx)?);
    let pipeline = Arc::new(MetadataPipeline::new(
        reqwest::Client::new(),
        Arc::new(FileCursorStore::new(&args.ledger.ledger)),
        events,
    ));
    let settings = Arc::new(FileSettings::new(&args.settings.settings));
    let mut orchestrator = Orchestrator::new(adapter, pipeline, settings, nav_rx);

    let printer = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            match event {
                FlowEvent::Log(line) => println!("{line}"),
                FlowEvent::PreviewReady(url) => println!("Preview: {url}"),
                FlowEvent::RunStopped => break,
                FlowEvent::RunStarted(_) => {}
            }
        }
    });

    let mode = if args.autoflow { RunMode::Autoflow } else { RunMode::Single };
    let mut request = StartRequest::new(mode).with_hints(TagHints::new(
        args.hints.main_tag.as_deref(),
        args.hints.suggestion_tag.as_deref(),
    ));
    request.total_count = args.count;
    info!(?mode, images = %args.images.display(), "starting run");

    let finished = {
        let run = orchestrator.start(request);
        tokio::pin!(run);
        tokio::select! {
            result = &mut run => Some(result),
            _ = tokio::signal::ctrl_c() => None,
        }
    };
    let summary = match finished {
        Some(result) => Some(result?),
        None => {
            warn!("interrupted");
            orchestrator.stop(RunOutcome::Cancelled)
        }
    };

    // 表示タスクは RunStopped か送信側の終了で抜ける
    drop(orchestrator);
    if let Err(e) = printer.await {
        warn!(error = %e, "event printer stopped unexpectedly");
    }

    let Some(summary) = summary else {
        return Err(CliError::Unsuccessful);
    };
    if args.summary {
        println!("{}", summary.to_json()?);
    }
    if summary.is_success() {
        Ok(())
    } else {
        Err(CliError::Unsuccessful)
    }
}

fn prompt(args: PromptArgs) -> Result<(), CliError> {
    let settings = FileSettings::new(&args.settings.settings).snapshot()?;
    let hints = TagHints::new(args.hints.main_tag.as_deref(), args.hints.suggestion_tag.as_deref());
    println!("{}", PromptBuilder::new(&settings).build(&hints));
    Ok(())
}

fn ledger(action: LedgerAction) -> Result<(), CliError> {
    match action {
        LedgerAction::Show { settings, ledger } => {
            let settings = Settings::from_file(&settings.settings)?;
            let store: Arc<dyn CursorStore> = Arc::new(FileCursorStore::new(&ledger.ledger));
            let ledger = CredentialLedger::new(ProviderKind::Gemini, settings.gemini_keys().to_vec(), store);
            let cursor = ledger.cursor()?;
            let state = if ledger.is_empty() {
                "no keys configured"
            } else if cursor >= ledger.len() {
                "exhausted, resets on next run"
            } else {
                "ready"
            };
            println!("gemini: key {}/{} ({state})", (cursor + 1).min(ledger.len()), ledger.len());
        }
        LedgerAction::Reset { ledger, provider } => {
            FileCursorStore::new(&ledger.ledger).save(provider, 0)?;
            println!("{provider}: cursor reset");
        }
    }
    Ok(())
}

fn config(action: ConfigAction) -> Result<(), CliError> {
    match action {
        ConfigAction::Init { settings, force } => {
            if settings.settings.exists() && !force {
                return Err(CliError::AlreadyExists(settings.settings));
            }
            Settings::from_toml("")?.to_file(&settings.settings)?;
            println!("{} を作成しました", settings.settings.display());
        }
    }
    Ok(())
}
