//! Scripted `AiCapability` used by the pipeline tests.
use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::fmt::MakeWriter;

use search_common::ai::{AiCapability, GroundingResult, SourceCitation};
use search_common::error::{AiError, StatusCode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Grounding,
    Json,
}

#[derive(Debug, Clone)]
pub struct Call {
    pub kind: CallKind,
    pub prompt: String,
    pub at: Instant,
}

/// Replies are consumed in order; an exhausted script answers `EmptyResponse`.
#[derive(Default)]
pub struct ScriptedAi {
    grounding: Mutex<VecDeque<Result<GroundingResult, AiError>>>,
    json: Mutex<VecDeque<Result<String, AiError>>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedAi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grounding(self, text: &str, sources: &[(&str, Option<&str>)]) -> Self {
        let result = GroundingResult {
            text: text.to_string(),
            sources: sources
                .iter()
                .map(|(url, title)| SourceCitation {
                    url: url.to_string(),
                    title: title.map(str::to_string),
                })
                .collect(),
        };
        self.grounding.lock().unwrap().push_back(Ok(result));
        self
    }

    pub fn grounding_err(self, err: AiError) -> Self {
        self.grounding.lock().unwrap().push_back(Err(err));
        self
    }

    pub fn json(self, raw: &str) -> Self {
        self.json.lock().unwrap().push_back(Ok(raw.to_string()));
        self
    }

    pub fn json_err(self, err: AiError) -> Self {
        self.json.lock().unwrap().push_back(Err(err));
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, kind: CallKind, prompt: &str) {
        self.calls.lock().unwrap().push(Call {
            kind,
            prompt: prompt.to_string(),
            at: Instant::now(),
        });
    }
}

#[async_trait]
impl AiCapability for ScriptedAi {
    fn model_name(&self) -> &str {
        "scripted-model"
    }

    async fn grounding_search(&self, prompt: &str) -> Result<GroundingResult, AiError> {
        self.record(CallKind::Grounding, prompt);
        self.grounding
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(AiError::EmptyResponse))
    }

    async fn generate_json(
        &self,
        prompt: &str,
        _schema: serde_json::Value,
    ) -> Result<String, AiError> {
        self.record(CallKind::Json, prompt);
        self.json
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(AiError::EmptyResponse))
    }
}

pub fn upstream_down() -> AiError {
    AiError::Upstream {
        status: StatusCode::SERVICE_UNAVAILABLE,
        message: "backend unavailable".to_string(),
    }
}

/// In-memory sink for formatted log lines.
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    pub fn lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.0.lock().unwrap())
            .lines()
            .map(str::to_string)
            .collect()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Route this thread's logs into a buffer until the guard drops.
///
/// Only works with the current-thread runtime that `#[tokio::test]` uses by default.
pub fn capture_logs() -> (CapturedLogs, DefaultGuard) {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::INFO)
        .finish();
    let guard = tracing::subscriber::set_default(subscriber);
    (logs, guard)
}
