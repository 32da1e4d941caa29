//! Platform-specific storage roots and transcript filename rules.
//!
//! VS Code family editors keep per-workspace state under
//! `<user data>/User/workspaceStorage/<workspace-hash>/`, where the user data
//! directory is:
//! - Linux: `~/.config/<flavour>`
//! - macOS: `~/Library/Application Support/<flavour>`
//! - Windows: `%APPDATA%\<flavour>`

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::{CHAT_SESSIONS_DIR_NAME, WORKSPACE_STORAGE_DIR_NAME};

/// Environment variable holding extra storage roots (platform path list).
pub const STORAGE_DIR_ENV: &str = "CHAT_INSIGHTS_STORAGE_DIR";

/// Editor flavours whose storage is scanned by default.
pub const EDITOR_FLAVOURS: &[&str] = &["Code", "Code - Insiders", "VSCodium", "Cursor"];

/// Transcript filenames: hex-looking id with a `.json` extension.
static SESSION_FILENAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9a-fA-F][0-9a-fA-F-]*\.json$").expect("session filename pattern is valid")
});

/// The user data directory for editors on this platform.
fn user_data_base() -> Option<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        dirs::data_dir()
    }
    #[cfg(not(target_os = "macos"))]
    {
        // ~/.config on Linux, %APPDATA% (Roaming) on Windows
        dirs::config_dir()
    }
}

/// Default `workspaceStorage` directories for every known editor flavour.
///
/// Roots are returned whether or not they exist; the scanner records missing
/// roots as diagnostics.
#[must_use]
pub fn default_storage_roots() -> Vec<PathBuf> {
    let Some(base) = user_data_base() else {
        return Vec::new();
    };

    EDITOR_FLAVOURS
        .iter()
        .map(|flavour| base.join(flavour).join("User").join(WORKSPACE_STORAGE_DIR_NAME))
        .collect()
}

/// Roots listed in [`STORAGE_DIR_ENV`].
#[must_use]
pub fn env_storage_roots() -> Vec<PathBuf> {
    std::env::var_os(STORAGE_DIR_ENV)
        .map(|value| std::env::split_paths(&value).filter(|p| !p.as_os_str().is_empty()).collect())
        .unwrap_or_default()
}

/// Combine explicit, environment and default roots, dropping duplicates while
/// keeping first-seen order.
#[must_use]
pub fn resolve_storage_roots(explicit: &[PathBuf], include_defaults: bool) -> Vec<PathBuf> {
    let mut roots: Vec<PathBuf> = Vec::new();
    let defaults = if include_defaults {
        default_storage_roots()
    } else {
        Vec::new()
    };

    for root in explicit.iter().cloned().chain(env_storage_roots()).chain(defaults) {
        if !roots.contains(&root) {
            roots.push(root);
        }
    }
    roots
}

/// Whether a bare filename looks like a chat transcript.
#[must_use]
pub fn is_session_filename(filename: &str) -> bool {
    SESSION_FILENAME.is_match(filename)
}

/// Whether a path is a transcript inside a `chatSessions` directory.
#[must_use]
pub fn is_session_file(path: &Path) -> bool {
    let in_sessions_dir = path
        .parent()
        .and_then(|p| p.file_name())
        .map(|n| n == CHAT_SESSIONS_DIR_NAME)
        .unwrap_or(false);

    in_sessions_dir
        && path
            .file_name()
            .and_then(|n| n.to_str())
            .map(is_session_filename)
            .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_filename_pattern() {
        assert!(is_session_filename("40afc8a7-3fcb-4d29-b1ee-100b81b8c6c0.json"));
        assert!(is_session_filename("ABCDEF0123.json"));

        assert!(!is_session_filename("notes.json"));
        assert!(!is_session_filename("40afc8a7.jsonl"));
        assert!(!is_session_filename("-abc.json"));
        assert!(!is_session_filename("40afc8a7.json.bak"));
    }

    #[test]
    fn test_is_session_file_requires_chat_sessions_parent() {
        let good = Path::new("/x/workspaceStorage/abc/chatSessions/0a1b.json");
        let wrong_dir = Path::new("/x/workspaceStorage/abc/other/0a1b.json");
        assert!(is_session_file(good));
        assert!(!is_session_file(wrong_dir));
    }

    #[test]
    fn test_default_roots_end_in_workspace_storage() {
        for root in default_storage_roots() {
            assert!(root.ends_with(Path::new("User").join(WORKSPACE_STORAGE_DIR_NAME)));
        }
    }

    #[test]
    fn test_resolve_deduplicates_explicit_roots() {
        let a = PathBuf::from("/tmp/a/workspaceStorage");
        let roots = resolve_storage_roots(&[a.clone(), a.clone()], false);
        assert_eq!(roots.iter().filter(|r| **r == a).count(), 1);
        assert_eq!(roots[0], a);
    }
}
