//! Transcript discovery across editor storage roots.
//!
//! Layout walked by [`discover_session_files`]:
//!
//! ```text
//! <root>/                       e.g. ~/.config/Code/User/workspaceStorage
//!   <workspace-hash>/
//!     chatSessions/
//!       <hex-id>.json           one transcript per chat session
//! ```
//!
//! Nothing here is fatal: unreadable roots, unreadable directories and
//! oversized files are reported as [`DiscoveryDiagnostic`]s and skipped.

mod paths;

pub use paths::*;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};
use walkdir::WalkDir;

use crate::CHAT_SESSIONS_DIR_NAME;

/// Why a path was left out of discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum DiagnosticKind {
    /// Storage root missing or unreadable.
    RootUnavailable {
        /// Underlying error text.
        reason: String,
    },
    /// Directory or file metadata could not be read.
    Unreadable {
        /// Underlying error text.
        reason: String,
    },
    /// File exceeds the size limit.
    Oversized {
        /// Actual size in bytes.
        size: u64,
        /// Configured limit in bytes.
        max_size: u64,
    },
}

/// A skipped path and the reason it was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryDiagnostic {
    /// Path that was skipped.
    pub path: PathBuf,
    /// Reason.
    #[serde(flatten)]
    pub kind: DiagnosticKind,
}

/// Outcome of one discovery pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryReport {
    /// Candidate transcripts, sorted by path.
    pub files: Vec<PathBuf>,
    /// Skipped paths.
    pub diagnostics: Vec<DiscoveryDiagnostic>,
    /// Roots that could be listed.
    pub roots_scanned: usize,
}

impl DiscoveryReport {
    /// Number of files skipped for exceeding the size limit.
    #[must_use]
    pub fn oversized_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| matches!(d.kind, DiagnosticKind::Oversized { .. }))
            .count()
    }

    /// Number of roots that could not be listed.
    #[must_use]
    pub fn unavailable_roots(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| matches!(d.kind, DiagnosticKind::RootUnavailable { .. }))
            .count()
    }
}

/// Enumerate transcript files under every root.
///
/// A file qualifies when it sits at `<root>/<workspace>/chatSessions/<name>`,
/// its name matches [`is_session_filename`], and it is no larger than
/// `max_file_size` bytes.
pub fn discover_session_files(roots: &[PathBuf], max_file_size: u64) -> DiscoveryReport {
    let mut report = DiscoveryReport::default();

    for root in roots {
        match std::fs::metadata(root) {
            Ok(meta) if meta.is_dir() => {
                report.roots_scanned += 1;
                scan_root(root, max_file_size, &mut report);
            }
            Ok(_) => {
                warn!(root = %root.display(), "Storage root is not a directory");
                report.diagnostics.push(DiscoveryDiagnostic {
                    path: root.clone(),
                    kind: DiagnosticKind::RootUnavailable {
                        reason: "not a directory".to_string(),
                    },
                });
            }
            Err(e) => {
                // Missing roots are the common case (editor flavour not installed)
                if e.kind() == std::io::ErrorKind::NotFound {
                    debug!(root = %root.display(), "Storage root does not exist");
                } else {
                    warn!(root = %root.display(), error = %e, "Storage root unavailable");
                }
                report.diagnostics.push(DiscoveryDiagnostic {
                    path: root.clone(),
                    kind: DiagnosticKind::RootUnavailable {
                        reason: e.to_string(),
                    },
                });
            }
        }
    }

    report.files.sort();
    debug!(
        files = report.files.len(),
        skipped = report.diagnostics.len(),
        roots = report.roots_scanned,
        "Discovery finished"
    );
    report
}

fn scan_root(root: &Path, max_file_size: u64, report: &mut DiscoveryReport) {
    // <root>/<workspace>/chatSessions/<file> sits exactly three levels down
    // filter_entry skips entries above min_depth, so depth is checked by hand
    let walker = WalkDir::new(root)
        .max_depth(3)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| match entry.depth() {
            1 => entry.file_type().is_dir(),
            2 => entry.file_type().is_dir() && entry.file_name() == CHAT_SESSIONS_DIR_NAME,
            _ => true,
        });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e.path().map_or_else(|| root.to_path_buf(), Path::to_path_buf);
                warn!(path = %path.display(), error = %e, "Skipping unreadable path");
                report.diagnostics.push(DiscoveryDiagnostic {
                    path,
                    kind: DiagnosticKind::Unreadable {
                        reason: e.to_string(),
                    },
                });
                continue;
            }
        };

        if entry.depth() != 3 || !entry.file_type().is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str() else {
            continue;
        };
        if !is_session_filename(name) {
            trace!(path = %entry.path().display(), "Ignoring non-transcript file");
            continue;
        }

        match entry.metadata() {
            Ok(meta) if meta.len() > max_file_size => {
                warn!(
                    path = %entry.path().display(),
                    size = meta.len(),
                    max_size = max_file_size,
                    "Skipping oversized transcript"
                );
                report.diagnostics.push(DiscoveryDiagnostic {
                    path: entry.path().to_path_buf(),
                    kind: DiagnosticKind::Oversized {
                        size: meta.len(),
                        max_size: max_file_size,
                    },
                });
            }
            Ok(_) => report.files.push(entry.into_path()),
            Err(e) => {
                report.diagnostics.push(DiscoveryDiagnostic {
                    path: entry.path().to_path_buf(),
                    kind: DiagnosticKind::Unreadable {
                        reason: e.to_string(),
                    },
                });
            }
        }
    }
}

/// Format a size in bytes as human-readable string.
#[must_use]
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_file(root: &Path, workspace: &str, dir: &str, name: &str, len: usize) -> PathBuf {
        let path = root.join(workspace).join(dir).join(name);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "x".repeat(len)).unwrap();
        path
    }

    #[test]
    fn test_discovers_only_chat_session_transcripts() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path().join("workspaceStorage");

        let keep = make_file(&root, "ws1", CHAT_SESSIONS_DIR_NAME, "0a1b2c.json", 10);
        make_file(&root, "ws1", CHAT_SESSIONS_DIR_NAME, "readme.txt", 10);
        make_file(&root, "ws1", "otherDir", "0a1b2d.json", 10);
        make_file(&root, "ws2", CHAT_SESSIONS_DIR_NAME, "not-hex.json", 10);

        let report = discover_session_files(&[root], 1024);
        assert_eq!(report.files, vec![keep]);
        assert!(report.diagnostics.is_empty());
        assert_eq!(report.roots_scanned, 1);
    }

    #[test]
    fn test_stray_json_outside_chat_sessions_is_ignored() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path().join("workspaceStorage");

        let keep = make_file(&root, "ws1", CHAT_SESSIONS_DIR_NAME, "0a1b2c.json", 10);
        make_file(&root, "ws1", "state", "0a1b2d.json", 10);
        make_file(&root, "ws2", "chatEditingSessions", "0a1b2e.json", 10);
        std::fs::write(root.join("ws1").join("0a1b2f.json"), "x").unwrap();
        std::fs::write(root.join("0a1b30.json"), "x").unwrap();

        let report = discover_session_files(&[root], 1024);
        assert_eq!(report.files, vec![keep]);
    }

    #[test]
    fn test_oversized_files_are_diagnosed() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path().join("workspaceStorage");

        make_file(&root, "ws1", CHAT_SESSIONS_DIR_NAME, "aa.json", 10);
        let big = make_file(&root, "ws1", CHAT_SESSIONS_DIR_NAME, "bb.json", 200);

        let report = discover_session_files(&[root], 100);
        assert_eq!(report.files.len(), 1);
        assert_eq!(report.oversized_count(), 1);
        assert_eq!(report.diagnostics[0].path, big);
    }

    #[test]
    fn test_missing_root_does_not_stop_scan() {
        let temp = tempfile::tempdir().unwrap();
        let missing = temp.path().join("nope");
        let root = temp.path().join("workspaceStorage");
        make_file(&root, "ws1", CHAT_SESSIONS_DIR_NAME, "aa.json", 10);

        let report = discover_session_files(&[missing, root], 100);
        assert_eq!(report.files.len(), 1);
        assert_eq!(report.unavailable_roots(), 1);
        assert_eq!(report.roots_scanned, 1);
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(500), "500 B");
        assert_eq!(format_size(1024), "1.00 KB");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(1048576), "1.00 MB");
        assert_eq!(format_size(1073741824), "1.00 GB");
    }
}
