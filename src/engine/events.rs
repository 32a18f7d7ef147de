//! 表示層へ送るイベント
//!
//! オーケストレーターとパイプラインは、ユーザー向けのログ行や実行状態の変化を
//! [`FlowEvent`] として非同期チャネルに流します。受信側がいなくなっても
//! 実行は継続します。

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::state::RunMode;

/// 表示層へのイベント
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum FlowEvent {
    /// ユーザー向けのログ行
    Log(String),
    RunStarted(RunMode),
    RunStopped,
    /// 処理中のデザイン画像の URL
    PreviewReady(String),
}

/// [`FlowEvent`] の送信側
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<FlowEvent>,
}

impl EventSink {
    pub fn new(tx: mpsc::UnboundedSender<FlowEvent>) -> Self {
        Self { tx }
    }

    /// 送信側と受信側の組を作る
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<FlowEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn emit(&self, event: FlowEvent) {
        if self.tx.send(event).is_err() {
            debug!("event receiver closed, dropping event");
        }
    }

    /// ログ行を tracing とイベントの両方に出す
    pub fn log(&self, message: impl Into<String>) {
        let message = message.into();
        info!(target: "teeflow::flow", "{message}");
        self.emit(FlowEvent::Log(message));
    }

    /// 警告レベルのログ行
    pub fn warn(&self, message: impl Into<String>) {
        let message = message.into();
        warn!(target: "teeflow::flow", "{message}");
        self.emit(FlowEvent::Log(message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_is_forwarded() {
        let (sink, mut rx) = EventSink::channel();

        sink.log("hello");
        sink.emit(FlowEvent::RunStopped);

        assert_eq!(rx.try_recv().unwrap(), FlowEvent::Log("hello".to_string()));
        assert_eq!(rx.try_recv().unwrap(), FlowEvent::RunStopped);
    }

    #[test]
    fn test_closed_receiver_is_ignored() {
        let (sink, rx) = EventSink::channel();
        drop(rx);

        sink.log("nobody listens");
    }

    #[test]
    fn test_event_json_shape() {
        let json = serde_json::to_string(&FlowEvent::RunStarted(RunMode::Autoflow)).unwrap();
        assert_eq!(json, r#"{"type":"run_started","data":"autoflow"}"#);

        let json = serde_json::to_string(&FlowEvent::RunStopped).unwrap();
        assert_eq!(json, r#"{"type":"run_stopped"}"#);
    }
}
