//! Deterministic identifiers and file name anonymization.

use crate::util::sha256_hex;

/// Length of an event id in hex characters.
pub const EVENT_ID_LEN: usize = 16;

/// Event id for a request: the first 16 hex chars of
/// `sha256("<session_id>-<request_id>")`.
///
/// Rescanning the same transcript always yields the same ids, which is what
/// lets consumers deduplicate.
#[must_use]
pub fn event_id(session_id: &str, request_id: &str) -> String {
    let mut hex = sha256_hex(format!("{session_id}-{request_id}").as_bytes());
    hex.truncate(EVENT_ID_LEN);
    hex
}

/// Replace a file path by a stable opaque name that keeps only the extension.
///
/// `src/secret/payroll.rs` becomes `file-1a2b3c4d.rs`.
#[must_use]
pub fn anonymized_file_name(path: &str) -> String {
    let hash = sha256_hex(path.as_bytes());
    match file_extension(path) {
        Some(ext) => format!("file-{}.{ext}", &hash[..8]),
        None => format!("file-{}", &hash[..8]),
    }
}

/// Lowercased extension of the last path segment, for `/` and `\` paths
/// and URIs alike.
#[must_use]
pub fn file_extension(path: &str) -> Option<String> {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    let name = path.rsplit(['/', '\\']).next().unwrap_or(path);
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_id_is_deterministic() {
        let a = event_id("session-1", "request-1");
        let b = event_id("session-1", "request-1");
        assert_eq!(a, b);
        assert_eq!(a.len(), EVENT_ID_LEN);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_event_id_matches_sha256_prefix() {
        // sha256("a-b")
        let full = sha256_hex(b"a-b");
        assert_eq!(event_id("a", "b"), full[..16]);
        assert_ne!(event_id("a", "b"), event_id("a-b", ""));
    }

    #[test]
    fn test_anonymized_file_name_keeps_extension() {
        let name = anonymized_file_name("/home/me/src/main.RS");
        assert!(name.starts_with("file-"));
        assert!(name.ends_with(".rs"));
        assert_eq!(name.len(), "file-".len() + 8 + ".rs".len());
        assert_eq!(name, anonymized_file_name("/home/me/src/main.RS"));
        assert_ne!(name, anonymized_file_name("/home/me/src/lib.rs"));
    }

    #[test]
    fn test_file_extension() {
        assert_eq!(file_extension("C:\\work\\app.py").as_deref(), Some("py"));
        assert_eq!(file_extension("file:///x/y/index.tsx?line=3").as_deref(), Some("tsx"));
        assert_eq!(file_extension("/x/Makefile"), None);
        assert_eq!(file_extension("/x/.gitignore"), None);
        assert_eq!(file_extension("/x.y/README"), None);
    }
}
