use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::sync::mpsc;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use teeflow::adapter::DirectoryAdapter;
use teeflow::adapter::directory::MANIFEST_FILE;
use teeflow::config::{ProviderKind, Settings, StaticSettings};
use teeflow::engine::{EventSink, FlowEvent, Orchestrator, RunMode, RunOutcome, StartRequest};
use teeflow::error::ProviderError;
use teeflow::metadata::{MetadataPipeline, TagHints};
use teeflow::provider::gemini::GeminiClient;
use teeflow::provider::{
    CursorStore, FileCursorStore, GenerationRequest, ProviderClient, ProviderResponse, StopReason, TokenUsage,
};

const MODEL: &str = "gemini-2.0-flash";

fn design_dir(names: &[&str]) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    for name in names {
        std::fs::write(dir.path().join(name), b"fake image bytes").unwrap();
    }
    dir
}

fn read_json(path: impl AsRef<Path>) -> Value {
    let content = std::fs::read_to_string(path).unwrap();
    serde_json::from_str(&content).unwrap()
}

fn drain_logs(rx: &mut mpsc::UnboundedReceiver<FlowEvent>) -> Vec<String> {
    let mut logs = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let FlowEvent::Log(line) = event {
            logs.push(line);
        }
    }
    logs
}

struct UnparsableProvider;

#[async_trait]
impl ProviderClient for UnparsableProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    async fn generate(&self, request: GenerationRequest<'_>) -> Result<ProviderResponse, ProviderError> {
        Ok(ProviderResponse {
            content: "not valid json at all".to_string(),
            token_usage: TokenUsage::default(),
            stop_reason: StopReason::EndTurn,
            model: request.model.to_string(),
        })
    }
}

#[tokio::test]
async fn test_autoflow_rotates_keys_and_publishes() {
    let server = MockServer::start().await;
    let generated = json!({
        "title": "Retro Cat Vector",
        "description": "A retro cat for cat lovers",
        "main_tag": "cat",
        "supporting_tags": "retro, vintage, retro",
        "colors": {"tshirt": "Black"}
    });

    Mock::given(method("POST"))
        .and(path(format!("/v1beta/models/{MODEL}:generateContent")))
        .and(header("x-goog-api-key", "expired-key"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {"code": 400, "message": "API key not valid. Please pass a valid API key."}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/v1beta/models/{MODEL}:generateContent")))
        .and(header("x-goog-api-key", "live-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": {"parts": [{"text": generated.to_string()}]},
                "finishReason": "STOP"
            }]
        })))
        .expect(2)
        .mount(&server)
        .await;

    let images = design_dir(&["a-first.png", "b-second.png"]);
    let out = tempfile::tempdir().unwrap();
    let ledger_path = out.path().join("ledger.toml");

    let settings = Settings::from_toml(&format!(
        r#"
ai_provider = "gemini"
gemini_keys = ["expired-key", "live-key"]
gemini_model = "{MODEL}"
autoflow_delay = 0
auto_publish = true
"#
    ))
    .unwrap();

    let (events, mut event_rx) = EventSink::channel();
    let (nav_tx, nav_rx) = mpsc::unbounded_channel();
    let adapter = Arc::new(DirectoryAdapter::open(images.path(), out.path(), nav_tx).unwrap());
    let store = Arc::new(FileCursorStore::new(&ledger_path));
    let pipeline = MetadataPipeline::new(reqwest::Client::new(), store, events)
        .with_client(Arc::new(GeminiClient::with_base_url(reqwest::Client::new(), server.uri())));
    let mut orchestrator =
        Orchestrator::new(adapter, Arc::new(pipeline), Arc::new(StaticSettings(settings)), nav_rx);

    let summary = orchestrator
        .start(StartRequest::new(RunMode::Autoflow).with_count(2))
        .await
        .unwrap();

    assert_eq!(summary.outcome, RunOutcome::Published);
    assert_eq!(summary.counters.form_fills, 2);
    assert_eq!(summary.counters.prefetch_hits, 1);
    assert!(summary.counters.published);

    // 失敗したキーは飛ばされ、次回は有効なキーから始まる
    let cursor = FileCursorStore::new(&ledger_path).load(ProviderKind::Gemini).unwrap();
    assert_eq!(cursor, 1);

    let first = read_json(out.path().join("a-first.json"));
    assert_eq!(first["title"], "Retro Cat");
    assert_eq!(first["main_tag"], "cat");
    assert_eq!(first["supporting_tags"], json!(["retro", "vintage"]));
    assert_eq!(first["tags"], "retro, vintage");
    assert!(out.path().join("b-second.json").exists());

    let manifest = read_json(out.path().join(MANIFEST_FILE));
    assert_eq!(manifest["published"], json!(["a-first.json", "b-second.json"]));

    let logs = drain_logs(&mut event_rx);
    let terminal: Vec<_> = logs.iter().filter(|line| line.starts_with("--- ")).collect();
    assert_eq!(terminal, vec!["--- All designs have been published successfully. ---"]);
}

#[tokio::test]
async fn test_unparsable_response_fills_default_metadata() {
    let images = design_dir(&["only.jpg"]);
    let out = tempfile::tempdir().unwrap();
    let settings = Settings::from_toml("gemini_keys = [\"k1\"]\nmature_content = true\n").unwrap();

    let (events, mut event_rx) = EventSink::channel();
    let (nav_tx, nav_rx) = mpsc::unbounded_channel();
    let adapter = Arc::new(DirectoryAdapter::open(images.path(), out.path(), nav_tx).unwrap());
    let pipeline = MetadataPipeline::new(
        reqwest::Client::new(),
        Arc::new(FileCursorStore::new(out.path().join("ledger.toml"))),
        events,
    )
    .with_client(Arc::new(UnparsableProvider));
    let mut orchestrator =
        Orchestrator::new(adapter, Arc::new(pipeline), Arc::new(StaticSettings(settings)), nav_rx);

    let request = StartRequest::new(RunMode::Single).with_hints(TagHints::new(Some("cat"), None));
    let summary = orchestrator.start(request).await.unwrap();

    assert_eq!(summary.outcome, RunOutcome::Completed);
    assert!(!out.path().join(MANIFEST_FILE).exists());

    let entry = read_json(out.path().join("only.json"));
    assert_eq!(entry["title"], "Unique Design");
    assert_eq!(entry["main_tag"], "design");
    assert_eq!(entry["colors"]["baseball"], "Black/White");
    assert_eq!(entry["mature_content"], true);

    let logs = drain_logs(&mut event_rx);
    assert!(logs.iter().any(|line| line.starts_with("Could not parse AI response")));
    assert_eq!(logs.last().map(String::as_str), Some("--- Single process completed successfully. ---"));
}

#[tokio::test]
async fn test_missing_key_still_fills_form() {
    let images = design_dir(&["only.png"]);
    let out = tempfile::tempdir().unwrap();
    let settings = Settings::from_toml("ai_provider = \"groq\"\n").unwrap();

    let (events, mut event_rx) = EventSink::channel();
    let (nav_tx, nav_rx) = mpsc::unbounded_channel();
    let adapter = Arc::new(DirectoryAdapter::open(images.path(), out.path(), nav_tx).unwrap());
    let pipeline = MetadataPipeline::new(
        reqwest::Client::new(),
        Arc::new(FileCursorStore::new(out.path().join("ledger.toml"))),
        events,
    );
    let mut orchestrator =
        Orchestrator::new(adapter, Arc::new(pipeline), Arc::new(StaticSettings(settings)), nav_rx);

    let summary = orchestrator.start(StartRequest::new(RunMode::Single)).await.unwrap();

    assert_eq!(summary.outcome, RunOutcome::Completed);
    assert_eq!(read_json(out.path().join("only.json"))["title"], "Unique Design");
    let logs = drain_logs(&mut event_rx);
    assert!(logs.iter().any(|line| line.starts_with("AI request failed")));
}
