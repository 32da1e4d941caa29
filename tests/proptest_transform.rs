//! Property-based tests for parsing and transformation.
//!
//! Uses proptest to check that ids are deterministic, estimates follow
//! their formula, and arbitrary input never panics.

use std::path::Path;

use proptest::prelude::*;
use vscode_chat_insights::model::RawRequest;
use vscode_chat_insights::scanner::parse_session_bytes;
use vscode_chat_insights::transform::{
    anonymized_file_name, estimate_tokens, event_id, file_extension, EventClassifier, EVENT_ID_LEN,
};
use vscode_chat_insights::EventType;

fn request_with_text(text: &str) -> RawRequest {
    serde_json::from_value(serde_json::json!({
        "requestId": "r",
        "timestamp": 1_700_000_000_000_i64,
        "message": { "text": text }
    }))
    .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Event ids depend only on session and request id.
    #[test]
    fn event_id_is_deterministic(session in ".*", request in ".*") {
        let a = event_id(&session, &request);
        let b = event_id(&session, &request);
        prop_assert_eq!(&a, &b);
        prop_assert_eq!(a.len(), EVENT_ID_LEN);
        prop_assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    /// Different requests of one session get different ids.
    #[test]
    fn event_ids_differ_per_request(session in "[a-f0-9]{8,32}", a in "[a-z0-9_]{1,16}", b in "[a-z0-9_]{1,16}") {
        prop_assume!(a != b);
        prop_assert_ne!(event_id(&session, &a), event_id(&session, &b));
    }

    /// Token estimate is round(chars / 4).
    #[test]
    fn token_estimate_formula(message in ".{0,400}", response in ".{0,400}") {
        let chars = (message.chars().count() + response.chars().count()) as u64;
        prop_assert_eq!(estimate_tokens(&message, &response), (chars + 2) / 4);
    }

    /// Anonymized names never leak the directory or stem.
    #[test]
    fn anonymized_name_hides_path(dir in "[g-z]{4,12}", stem in "[g-z]{4,12}", ext in "(rs|py|ts|go)") {
        let path = format!("/home/{dir}/{stem}.{ext}");
        let name = anonymized_file_name(&path);
        let suffix = format!(".{ext}");
        prop_assert!(!name.contains(&dir));
        prop_assert!(!name.contains(&stem));
        prop_assert!(name.ends_with(&suffix));
        prop_assert_eq!(file_extension(&path), Some(ext));
    }

    /// The parser rejects or accepts arbitrary bytes without panicking.
    #[test]
    fn parser_never_panics_on_arbitrary_bytes(bytes in prop::collection::vec(any::<u8>(), 0..4096)) {
        let _ = parse_session_bytes(Path::new("fuzz.json"), &bytes);
    }

    /// Any prompt mentioning a fix is an edit.
    #[test]
    fn fix_prompts_classify_as_edit(prefix in "[a-z ]{0,20}", suffix in "[a-z ]{0,20}") {
        let text = format!("{prefix} fix {suffix}");
        let classifier = EventClassifier::default();
        prop_assert_eq!(classifier.classify(&request_with_text(&text)), EventType::Edit);
    }
}
