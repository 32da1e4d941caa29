//! Synthetic transcript generators.
//!
//! Builds VS Code chat session documents and lays them out in a temporary
//! `workspaceStorage` tree the way the editor does.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::{json, Value};
use tempfile::TempDir;

/// Prompts cycled through by generated requests, one per event type.
pub const PROMPTS: &[&str] = &[
    "fix the bug in the parser",
    "explain what this function does",
    "generate unit tests for the cache",
    "hello there",
];

/// Configuration for generating a synthetic session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Session id.
    pub session_id: String,
    /// Number of requests.
    pub requests: usize,
    /// Time of the first request.
    pub start_time: DateTime<Utc>,
    /// Gap between requests.
    pub interval: Duration,
    /// Model id recorded on every request.
    pub model_id: Option<String>,
    /// File attached to every request.
    pub file: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_id: "0f0e0d0c0b0a".to_string(),
            requests: 4,
            start_time: Utc.with_ymd_and_hms(2024, 5, 6, 9, 0, 0).unwrap(),
            interval: Duration::minutes(2),
            model_id: Some("gpt-4o".to_string()),
            file: Some("/home/dev/project/src/lib.rs".to_string()),
        }
    }
}

impl SessionConfig {
    /// A session with `requests` requests starting at `start`.
    pub fn new(session_id: &str, requests: usize, start: DateTime<Utc>) -> Self {
        Self {
            session_id: session_id.to_string(),
            requests,
            start_time: start,
            ..Self::default()
        }
    }
}

/// One request object.
pub fn request(index: usize, timestamp: DateTime<Utc>, config: &SessionConfig) -> Value {
    let prompt = PROMPTS[index % PROMPTS.len()];
    let mut request = json!({
        "requestId": format!("request_{index}"),
        "timestamp": timestamp.timestamp_millis(),
        "message": { "text": prompt, "parts": [{ "kind": "text", "text": prompt }] },
        "response": [{ "value": "Sure, here you go." }],
        "result": { "timings": { "firstProgress": 350, "totalElapsed": 1200 + index as u64 * 100 } },
        "isCanceled": false
    });
    if let Some(model) = &config.model_id {
        request["modelId"] = json!(model);
    }
    if let Some(file) = &config.file {
        request["variableData"] = json!({
            "variables": [{ "kind": "file", "name": "file", "value": { "uri": { "path": file } } }]
        });
    }
    request
}

/// A complete session document.
pub fn session(config: &SessionConfig) -> Value {
    let requests: Vec<Value> = (0..config.requests)
        .map(|i| {
            let ts = config.start_time + config.interval * i32::try_from(i).unwrap();
            request(i, ts, config)
        })
        .collect();

    json!({
        "version": 3,
        "sessionId": config.session_id,
        "creationDate": config.start_time.timestamp_millis(),
        "lastMessageDate": (config.start_time + config.interval * i32::try_from(config.requests).unwrap()).timestamp_millis(),
        "requesterUsername": "dev",
        "responderUsername": "GitHub Copilot",
        "initialLocation": "panel",
        "requests": requests
    })
}

/// A temporary `workspaceStorage` tree.
pub struct StorageFixture {
    dir: TempDir,
}

impl StorageFixture {
    /// Create an empty tree.
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("workspaceStorage")).unwrap();
        Self { dir }
    }

    /// The storage root to hand to the scanner.
    pub fn root(&self) -> PathBuf {
        self.dir.path().join("workspaceStorage")
    }

    /// A path outside the storage root, e.g. for a state file.
    pub fn scratch(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Write a raw document as `<workspace>/chatSessions/<file_name>`.
    pub fn write_raw(&self, workspace: &str, file_name: &str, content: &[u8]) -> PathBuf {
        let dir = self.root().join(workspace).join("chatSessions");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(file_name);
        std::fs::write(&path, content).unwrap();
        path
    }

    /// Write a generated session; the file is named after the session id.
    pub fn write_session(&self, workspace: &str, config: &SessionConfig) -> PathBuf {
        let content = serde_json::to_vec_pretty(&session(config)).unwrap();
        self.write_raw(workspace, &format!("{}.json", config.session_id), &content)
    }

    /// Root as a slice-friendly vector.
    pub fn roots(&self) -> Vec<PathBuf> {
        vec![self.root()]
    }

    /// Base directory of the fixture.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}
