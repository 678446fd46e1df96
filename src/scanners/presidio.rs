/// Optional NER layer backed by a Microsoft Presidio analyzer process.
///
/// Rather than spawning a Python process per detection request, the analyzer
/// runs as a persistent loopback HTTP service and we talk JSON to it. The
/// first scan triggers a background warm-up: probe for an already-running
/// analyzer, otherwise locate a Python with presidio installed and start
/// one. Scans issued while the analyzer is cold return zero matches, so the
/// caller gets regex-only results instead of blocking on model load. If
/// warm-up fails the scanner is marked failed for the process lifetime;
/// `/health` reports the downgrade.
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use crate::constants::{
    PRESIDIO_PORT, PRESIDIO_REQUEST_TIMEOUT_SECS, PRESIDIO_STARTUP_TIMEOUT_SECS,
};
use crate::entities::{EntityMatch, EntityType};
use crate::error::{RedactorError, Result};
use crate::scanners::Scanner;

/// Entity types requested from the analyzer when the config whitelist is
/// empty.
const DEFAULT_ENTITIES: &[&str] = &[
    "PERSON",
    "ORGANIZATION",
    "LOCATION",
    "NRP",
    "DATE_TIME",
    "URL",
    "EMAIL_ADDRESS",
    "PHONE_NUMBER",
    "IP_ADDRESS",
];

/// Minimal analyzer service: stdlib HTTP server wrapping AnalyzerEngine.
/// Written to a temp file and launched with the discovered interpreter.
const ANALYZER_SCRIPT: &str = r#"
import json
import sys
from http.server import BaseHTTPRequestHandler, HTTPServer

from presidio_analyzer import AnalyzerEngine

analyzer = AnalyzerEngine()


class Handler(BaseHTTPRequestHandler):
    def do_GET(self):
        if self.path == "/health":
            self._reply(200, {"status": "ok"})
        else:
            self._reply(404, {"error": "not found"})

    def do_POST(self):
        if self.path != "/analyze":
            self._reply(404, {"error": "not found"})
            return
        length = int(self.headers.get("Content-Length", 0))
        req = json.loads(self.rfile.read(length))
        results = analyzer.analyze(
            text=req["text"],
            language=req.get("language", "en"),
            entities=req.get("entities") or None,
            score_threshold=req.get("score_threshold", 0.0),
        )
        entities = [
            {
                "entity_type": r.entity_type,
                "start": r.start,
                "end": r.end,
                "score": r.score,
            }
            for r in results
        ]
        self._reply(200, {"entities": entities})

    def _reply(self, code, body):
        payload = json.dumps(body).encode("utf-8")
        self.send_response(code)
        self.send_header("Content-Type", "application/json")
        self.send_header("Content-Length", str(len(payload)))
        self.end_headers()
        self.wfile.write(payload)

    def log_message(self, fmt, *args):
        pass


if __name__ == "__main__":
    port = int(sys.argv[1]) if len(sys.argv) > 1 else 5033
    HTTPServer(("127.0.0.1", port), Handler).serve_forever()
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NerState {
    Cold,
    Ready,
    Failed,
}

#[derive(Debug, Serialize)]
struct AnalyzeRequest<'a> {
    text: &'a str,
    language: &'a str,
    entities: &'a [String],
    score_threshold: f32,
}

#[derive(Debug, Deserialize)]
struct AnalyzeResponse {
    entities: Vec<AnalyzerEntity>,
}

#[derive(Debug, Deserialize)]
struct AnalyzerEntity {
    entity_type: String,
    start: usize,
    end: usize,
    score: f32,
}

pub struct PresidioScanner {
    client: reqwest::Client,
    endpoint: String,
    language: String,
    score_threshold: f32,
    entities: Vec<String>,
    state: Arc<RwLock<NerState>>,
    process: Arc<Mutex<Option<Child>>>,
    warmup_started: AtomicBool,
}

impl PresidioScanner {
    pub fn new(language: &str, score_threshold: f32, entities: &[String]) -> Self {
        let entities = if entities.is_empty() {
            DEFAULT_ENTITIES.iter().map(|e| e.to_string()).collect()
        } else {
            entities.to_vec()
        };
        Self {
            client: reqwest::Client::new(),
            endpoint: format!("http://127.0.0.1:{PRESIDIO_PORT}"),
            language: language.to_string(),
            score_threshold,
            entities,
            state: Arc::new(RwLock::new(NerState::Cold)),
            process: Arc::new(Mutex::new(None)),
            warmup_started: AtomicBool::new(false),
        }
    }

    /// Whether the analyzer is warm. Cold means requests currently get
    /// regex-only results; failed means they always will.
    pub async fn is_ready(&self) -> bool {
        *self.state.read().await == NerState::Ready
    }

    /// Stop the analyzer child process, if we started one.
    pub async fn shutdown(&self) {
        let mut guard = self.process.lock().await;
        if let Some(mut child) = guard.take() {
            let _ = child.kill().await;
        }
    }

    async fn probe_health(client: &reqwest::Client, endpoint: &str) -> bool {
        client
            .get(format!("{endpoint}/health"))
            .timeout(Duration::from_secs(2))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    /// Locate an interpreter that can import presidio_analyzer.
    async fn find_python() -> Option<String> {
        for cmd in ["python3", "python"] {
            let check = Command::new(cmd)
                .arg("-c")
                .arg("import presidio_analyzer")
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .output()
                .await;
            if matches!(check, Ok(out) if out.status.success()) {
                return Some(cmd.to_string());
            }
        }
        None
    }

    async fn start_analyzer(
        client: &reqwest::Client,
        endpoint: &str,
        process: &Mutex<Option<Child>>,
    ) -> Result<()> {
        let python = Self::find_python().await.ok_or_else(|| {
            RedactorError::ModelLoadFailure("no Python with presidio_analyzer found".into())
        })?;

        let script_path = std::env::temp_dir().join("pii_redactor_analyzer.py");
        tokio::fs::write(&script_path, ANALYZER_SCRIPT)
            .await
            .map_err(|e| {
                RedactorError::ModelLoadFailure(format!("cannot write analyzer script: {e}"))
            })?;

        let child = Command::new(&python)
            .arg(&script_path)
            .arg(PRESIDIO_PORT.to_string())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| RedactorError::ModelLoadFailure(format!("cannot start analyzer: {e}")))?;

        *process.lock().await = Some(child);

        // Model loading dominates startup; poll until the service answers.
        let deadline =
            tokio::time::Instant::now() + Duration::from_secs(PRESIDIO_STARTUP_TIMEOUT_SECS);
        while tokio::time::Instant::now() < deadline {
            if Self::probe_health(client, endpoint).await {
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(500)).await;
        }

        if let Some(mut child) = process.lock().await.take() {
            let _ = child.kill().await;
        }
        Err(RedactorError::ModelLoadFailure(format!(
            "analyzer did not come up within {PRESIDIO_STARTUP_TIMEOUT_SECS}s"
        )))
    }

    /// Kick off the one-shot background warm-up. The outcome (ready or
    /// permanently failed) is shared by all subsequent scans.
    fn begin_warmup(&self) {
        if self.warmup_started.swap(true, Ordering::SeqCst) {
            return;
        }

        let client = self.client.clone();
        let endpoint = self.endpoint.clone();
        let state = Arc::clone(&self.state);
        let process = Arc::clone(&self.process);

        tokio::spawn(async move {
            let outcome = if Self::probe_health(&client, &endpoint).await {
                info!("presidio analyzer already running at {endpoint}");
                NerState::Ready
            } else {
                match Self::start_analyzer(&client, &endpoint, &process).await {
                    Ok(()) => {
                        info!("presidio analyzer started at {endpoint}");
                        NerState::Ready
                    }
                    Err(e) => {
                        warn!(error = %e, "NER layer unavailable; continuing regex-only");
                        NerState::Failed
                    }
                }
            };
            *state.write().await = outcome;
        });
    }

    async fn analyze(&self, text: &str) -> Result<Vec<EntityMatch>> {
        let request = AnalyzeRequest {
            text,
            language: &self.language,
            entities: &self.entities,
            score_threshold: self.score_threshold,
        };

        let response = self
            .client
            .post(format!("{}/analyze", self.endpoint))
            .timeout(Duration::from_secs(PRESIDIO_REQUEST_TIMEOUT_SECS))
            .json(&request)
            .send()
            .await
            .map_err(|e| RedactorError::ScannerFailure {
                scanner: "ner".into(),
                message: e.to_string(),
            })?;

        let parsed: AnalyzeResponse =
            response
                .json()
                .await
                .map_err(|e| RedactorError::ScannerFailure {
                    scanner: "ner".into(),
                    message: format!("malformed analyzer response: {e}"),
                })?;

        let chars: Vec<char> = text.chars().collect();
        Ok(normalize_entities(
            parsed.entities,
            &chars,
            self.score_threshold,
            &self.entities,
        ))
    }
}

/// Map raw analyzer output onto canonical `EntityMatch`es: drop
/// below-threshold and non-whitelisted matches, normalize tags, and slice
/// the matched text out of the input by character offset.
fn normalize_entities(
    raw: Vec<AnalyzerEntity>,
    chars: &[char],
    score_threshold: f32,
    allowed: &[String],
) -> Vec<EntityMatch> {
    let mut matches = Vec::new();
    for entity in raw {
        if entity.score < score_threshold {
            continue;
        }
        if entity.start >= entity.end || entity.end > chars.len() {
            continue;
        }
        if !allowed.is_empty()
            && !allowed
                .iter()
                .any(|a| a.eq_ignore_ascii_case(&entity.entity_type))
        {
            continue;
        }
        let text: String = chars[entity.start..entity.end].iter().collect();
        matches.push(EntityMatch {
            entity_type: EntityType::from_tag(&entity.entity_type),
            text,
            start: entity.start,
            end: entity.end,
            score: entity.score,
            source: "ner".to_string(),
        });
    }
    matches
}

#[async_trait]
impl Scanner for PresidioScanner {
    fn name(&self) -> &str {
        "ner"
    }

    async fn scan(&self, text: &str) -> Result<Vec<EntityMatch>> {
        match *self.state.read().await {
            NerState::Ready => self.analyze(text).await,
            NerState::Cold => {
                self.begin_warmup();
                Ok(Vec::new())
            }
            // Permanent downgrade: zero matches, regex layer carries on.
            NerState::Failed => Ok(Vec::new()),
        }
    }
}
