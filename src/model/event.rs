//! Normalized usage events.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::InsightsError;

/// Source tag carried by every event produced from chat transcripts.
pub const EVENT_SOURCE: &str = "vscode-chat";

/// Classified kind of an exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    /// General conversation.
    Chat,
    /// Code generation / completion request.
    Completion,
    /// Request to change existing code.
    Edit,
    /// Request to explain code or concepts.
    Explain,
}

impl EventType {
    /// All variants in display order.
    pub const ALL: [Self; 4] = [Self::Chat, Self::Completion, Self::Edit, Self::Explain];

    /// Lowercase wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Completion => "completion",
            Self::Edit => "edit",
            Self::Explain => "explain",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = InsightsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "chat" => Ok(Self::Chat),
            "completion" => Ok(Self::Completion),
            "edit" => Ok(Self::Edit),
            "explain" => Ok(Self::Explain),
            other => Err(InsightsError::InvalidArgument {
                name: "event type".to_string(),
                reason: format!("unknown event type '{other}'"),
            }),
        }
    }
}

/// Approximate process hierarchy of an event.
///
/// Transcripts carry no process identifiers, so all three levels are stable
/// pseudo-ids synthesized by the transformer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionHierarchy {
    /// Application instance (creation hour of the session).
    pub instance_id: String,
    /// Editor window (workspace), absent when the workspace is unknown.
    pub window_id: Option<String>,
    /// Extension host process (session prefix).
    pub host_process_id: String,
}

/// Version metadata stamped on every event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionInfo {
    /// Version of this crate when the event was produced.
    pub extension_version: String,
    /// Schema version of the source transcript.
    pub schema_version: i64,
}

/// The canonical, flattened representation of one exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedEvent {
    /// Deterministic id derived from session and request ids.
    pub id: String,
    /// When the request was made.
    pub timestamp: DateTime<Utc>,
    /// Classified kind.
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// Producer tag.
    pub source: String,
    /// Approximate process hierarchy.
    pub hierarchy: SessionHierarchy,
    /// Originating chat session.
    pub session_id: String,
    /// Originating request.
    pub request_id: String,
    /// Workspace hash, or `"unknown"`.
    pub workspace_id: String,
    /// Total elapsed time in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    /// Time to first streamed progress in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_to_first_progress_ms: Option<u64>,
    /// Estimated token count (characters / 4).
    pub token_estimate: u64,
    /// Model that served the request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    /// Inferred programming language.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Anonymized name of the file the request was about.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    /// Raw prompt text, only present when explicitly enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_text: Option<String>,
    /// Whether the user cancelled the request.
    #[serde(default)]
    pub cancelled: bool,
    /// Version metadata.
    pub version: VersionInfo,
}

/// Aggregate summary of one chat session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMetadata {
    /// Session id.
    pub session_id: String,
    /// Workspace hash, or `"unknown"`.
    pub workspace_id: String,
    /// Number of requests.
    pub request_count: usize,
    /// Total response length in characters.
    pub total_response_chars: usize,
    /// Mean response length in characters.
    pub average_response_chars: f64,
    /// Mean total elapsed time over requests that recorded one.
    pub average_response_time_ms: Option<f64>,
    /// Sum of token estimates.
    pub total_token_estimate: u64,
    /// Languages inferred across requests.
    pub languages: BTreeSet<String>,
    /// Models used across requests.
    pub models: BTreeSet<String>,
    /// Requests per classified type.
    pub event_types: IndexMap<EventType, usize>,
    /// Any request carried code citations.
    pub has_code_citations: bool,
    /// Any request carried content references.
    pub has_content_references: bool,
    /// Any request carried follow-up suggestions.
    pub has_followups: bool,
    /// Earliest request time.
    pub start_time: Option<DateTime<Utc>>,
    /// Latest request time.
    pub end_time: Option<DateTime<Utc>>,
}

impl SessionMetadata {
    /// Span between first and last request in milliseconds.
    #[must_use]
    pub fn duration_ms(&self) -> Option<i64> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_round_trip_names() {
        for ty in EventType::ALL {
            assert_eq!(ty.as_str().parse::<EventType>().unwrap(), ty);
        }
        assert_eq!("EDIT".parse::<EventType>().unwrap(), EventType::Edit);
        assert!("refactor".parse::<EventType>().is_err());
    }

    #[test]
    fn test_event_type_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&EventType::Explain).unwrap(), "\"explain\"");
    }

    #[test]
    fn test_metadata_duration() {
        let mut meta = SessionMetadata::default();
        assert_eq!(meta.duration_ms(), None);

        meta.start_time = DateTime::from_timestamp_millis(1_000);
        meta.end_time = DateTime::from_timestamp_millis(4_500);
        assert_eq!(meta.duration_ms(), Some(3_500));
    }
}
