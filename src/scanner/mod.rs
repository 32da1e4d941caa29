//! Session scanner: discovery, parsing and validation of chat transcripts.
//!
//! The scanner never fails a scan because of one bad file. Unparseable or
//! structurally invalid transcripts are counted and skipped; unreachable
//! roots and oversized files show up as diagnostics.
//!
//! # Example
//!
//! ```rust,no_run
//! use vscode_chat_insights::config::ScannerConfig;
//! use vscode_chat_insights::scanner::SessionScanner;
//!
//! # async fn demo() {
//! let scanner = SessionScanner::from_config(&ScannerConfig::default());
//! let (sessions, stats) = scanner.scan_all().await;
//! println!("{} sessions, {} errors", sessions.len(), stats.error_files);
//! # }
//! ```

mod validate;

pub use validate::validate_session;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::config::ScannerConfig;
use crate::discovery::{discover_session_files, resolve_storage_roots, DiscoveryDiagnostic, DiscoveryReport};
use crate::error::{InsightsError, Result};
use crate::model::RawSession;

/// A parsed transcript together with where it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionScanResult {
    /// Transcript path.
    pub path: PathBuf,
    /// File size in bytes at parse time.
    pub file_size: u64,
    /// Parsed session.
    pub session: RawSession,
}

/// Statistics about one full scan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanStatistics {
    /// Candidate transcripts found by discovery (size limit applied).
    pub scanned_files: usize,
    /// Transcripts parsed and validated successfully.
    pub parsed_sessions: usize,
    /// Requests across all parsed sessions.
    pub total_requests: usize,
    /// Transcripts that failed to read, parse or validate.
    pub error_files: usize,
    /// Transcripts skipped for exceeding the size limit.
    pub skipped_files: usize,
    /// Storage roots that could be listed.
    pub roots_scanned: usize,
    /// Wall-clock duration of the scan.
    pub scan_duration_ms: u64,
    /// Creation time of the oldest parsed session.
    pub oldest_session: Option<DateTime<Utc>>,
    /// Creation time of the newest parsed session.
    pub newest_session: Option<DateTime<Utc>>,
    /// When the scan finished.
    pub completed_at: Option<DateTime<Utc>>,
    /// Skipped paths from discovery.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<DiscoveryDiagnostic>,
}

/// Transcript scanner bound to a fixed set of storage roots.
#[derive(Debug, Clone)]
pub struct SessionScanner {
    roots: Arc<Vec<PathBuf>>,
    config: ScannerConfig,
    errors: Arc<AtomicUsize>,
}

impl SessionScanner {
    /// Create a scanner over explicit roots.
    #[must_use]
    pub fn new(roots: Vec<PathBuf>, config: ScannerConfig) -> Self {
        Self {
            roots: Arc::new(roots),
            config,
            errors: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Create a scanner over configured, environment and platform roots.
    #[must_use]
    pub fn from_config(config: &ScannerConfig) -> Self {
        let roots = resolve_storage_roots(&config.storage_roots, config.include_default_roots);
        Self::new(roots, config.clone())
    }

    /// Storage roots this scanner walks.
    #[must_use]
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Scanner configuration.
    #[must_use]
    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    /// Number of files that failed to parse since construction.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.errors.load(Ordering::Relaxed)
    }

    /// Enumerate candidate transcripts under all roots.
    pub fn discover_session_files(&self) -> DiscoveryReport {
        discover_session_files(&self.roots, self.config.max_file_size)
    }

    /// Parse and validate one transcript, returning `None` on any failure.
    ///
    /// Failures are logged and counted in [`Self::error_count`].
    pub async fn parse_file(&self, path: impl AsRef<Path>) -> Option<RawSession> {
        self.scan_file(path).await.map(|result| result.session)
    }

    /// Like [`Self::parse_file`], keeping path and size alongside the session.
    pub async fn scan_file(&self, path: impl AsRef<Path>) -> Option<SessionScanResult> {
        let path = path.as_ref();
        match self.try_scan_file(path).await {
            Ok(result) => Some(result),
            Err(e) => {
                self.errors.fetch_add(1, Ordering::Relaxed);
                debug!(path = %path.display(), error = %e, "Skipping transcript");
                None
            }
        }
    }

    /// Parse and validate one transcript, surfacing the failure reason.
    pub async fn try_scan_file(&self, path: &Path) -> Result<SessionScanResult> {
        let metadata = tokio::fs::metadata(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                InsightsError::FileNotFound {
                    path: path.to_path_buf(),
                }
            } else {
                InsightsError::io(format!("Failed to stat {}", path.display()), e)
            }
        })?;

        // Files can grow between discovery and parsing
        if metadata.len() > self.config.max_file_size {
            return Err(InsightsError::FileTooLarge {
                path: path.to_path_buf(),
                size: metadata.len(),
                max_size: self.config.max_file_size,
            });
        }

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| InsightsError::io(format!("Failed to read {}", path.display()), e))?;

        let session = parse_session_bytes(path, &bytes)?;
        Ok(SessionScanResult {
            path: path.to_path_buf(),
            file_size: metadata.len(),
            session,
        })
    }

    /// Discover and parse every transcript.
    ///
    /// Files are parsed in batches of `batch_size` concurrent reads to cap
    /// peak memory. Results are sorted by session creation time.
    #[instrument(skip(self), fields(roots = self.roots.len()))]
    pub async fn scan_all(&self) -> (Vec<SessionScanResult>, ScanStatistics) {
        let started = Instant::now();

        let scanner = self.clone();
        let report = match tokio::task::spawn_blocking(move || scanner.discover_session_files()).await {
            Ok(report) => report,
            Err(e) => {
                warn!(error = %e, "Discovery task failed");
                DiscoveryReport::default()
            }
        };

        let mut stats = ScanStatistics {
            scanned_files: report.files.len(),
            skipped_files: report.oversized_count(),
            roots_scanned: report.roots_scanned,
            ..ScanStatistics::default()
        };

        let mut results = Vec::with_capacity(report.files.len());
        for batch in report.files.chunks(self.config.batch_size.max(1)) {
            let outcomes = join_all(batch.iter().map(|path| self.try_scan_file(path))).await;
            for (path, outcome) in batch.iter().zip(outcomes) {
                match outcome {
                    Ok(result) => results.push(result),
                    Err(e) => {
                        stats.error_files += 1;
                        self.errors.fetch_add(1, Ordering::Relaxed);
                        warn!(path = %path.display(), error = %e, "Skipping transcript");
                    }
                }
            }
        }

        results.sort_by(|a, b| {
            a.session
                .creation_date
                .cmp(&b.session.creation_date)
                .then_with(|| a.path.cmp(&b.path))
        });

        stats.parsed_sessions = results.len();
        stats.total_requests = results.iter().map(|r| r.session.requests.len()).sum();
        stats.oldest_session = results
            .first()
            .and_then(|r| DateTime::from_timestamp_millis(r.session.creation_date));
        stats.newest_session = results
            .last()
            .and_then(|r| DateTime::from_timestamp_millis(r.session.creation_date));
        stats.scan_duration_ms = started.elapsed().as_millis() as u64;
        stats.completed_at = Some(Utc::now());
        stats.diagnostics = report.diagnostics;

        info!(
            files = stats.scanned_files,
            sessions = stats.parsed_sessions,
            requests = stats.total_requests,
            errors = stats.error_files,
            skipped = stats.skipped_files,
            duration_ms = stats.scan_duration_ms,
            "Scan complete"
        );

        (results, stats)
    }
}

/// Parse transcript bytes: JSON, then structural validation, then typing.
pub fn parse_session_bytes(path: &Path, bytes: &[u8]) -> Result<RawSession> {
    // Some editors write a UTF-8 BOM
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);

    let value: serde_json::Value =
        serde_json::from_slice(bytes).map_err(|e| InsightsError::parse_with_source(path, e))?;
    validate_session(path, &value)?;
    serde_json::from_value(value).map_err(|e| InsightsError::invalid(path, e.to_string()))
}
