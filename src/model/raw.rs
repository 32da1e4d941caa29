//! Raw chat-session transcript records.
//!
//! A transcript is one JSON document per chat session, written by the editor
//! under `workspaceStorage/<workspace-hash>/chatSessions/<session>.json`.
//! Only a handful of fields are structurally required (see
//! [`crate::scanner::validate_session`]); everything else is optional and the
//! loosely-typed members (message parts, content references, variables,
//! citations, follow-ups) are kept as raw JSON values.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// One persisted chat session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSession {
    /// Unique session identifier.
    pub session_id: String,
    /// Creation time, milliseconds since the Unix epoch.
    #[serde(deserialize_with = "lenient_millis")]
    pub creation_date: i64,
    /// Transcript schema version.
    #[serde(deserialize_with = "lenient_version")]
    pub version: i64,
    /// Exchanges in the order they happened.
    #[serde(default, deserialize_with = "null_as_default")]
    pub requests: Vec<RawRequest>,
    /// Name of the requesting user, if recorded.
    #[serde(default)]
    pub requester_username: Option<String>,
    /// Name of the responding assistant, if recorded.
    #[serde(default)]
    pub responder_username: Option<String>,
    /// Where the chat was opened (panel, editor, terminal...).
    #[serde(default)]
    pub initial_location: Option<String>,
    /// Time of the last message, milliseconds since the Unix epoch.
    #[serde(default, deserialize_with = "lenient_optional_millis")]
    pub last_message_date: Option<i64>,
    /// Whether the session was imported from elsewhere.
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_imported: bool,
}

/// One request/response exchange within a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRequest {
    /// Request identifier, unique within the session.
    pub request_id: String,
    /// Request time, milliseconds since the Unix epoch.
    #[serde(deserialize_with = "lenient_millis")]
    pub timestamp: i64,
    /// Model that served the request.
    #[serde(default)]
    pub model_id: Option<String>,
    /// The user's message.
    pub message: RawMessage,
    /// Agent (participant) that handled the request.
    #[serde(default)]
    pub agent: Option<RawAgent>,
    /// Response fragments, in order.
    #[serde(default, deserialize_with = "null_as_default")]
    pub response: Vec<Value>,
    /// Completion result, including timings.
    #[serde(default)]
    pub result: Option<RequestResult>,
    /// Files and symbols referenced while answering.
    #[serde(default, deserialize_with = "null_as_default")]
    pub content_references: Vec<Value>,
    /// Public-code citations attached to the response.
    #[serde(default, deserialize_with = "null_as_default")]
    pub code_citations: Vec<Value>,
    /// Suggested follow-up prompts.
    #[serde(default, deserialize_with = "null_as_default")]
    pub followups: Vec<Value>,
    /// Context variables attached to the prompt.
    #[serde(default)]
    pub variable_data: Option<VariableData>,
    /// Whether the user cancelled the request.
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_canceled: bool,
}

impl RawRequest {
    /// Concatenated text of all response fragments.
    ///
    /// Fragments carry their text in `value`, either directly as a string or
    /// nested as `{ "value": "..." }` for markdown fragments.
    #[must_use]
    pub fn response_text(&self) -> String {
        let mut text = String::new();
        for fragment in &self.response {
            match fragment.get("value") {
                Some(Value::String(s)) => text.push_str(s),
                Some(Value::Object(inner)) => {
                    if let Some(Value::String(s)) = inner.get("value") {
                        text.push_str(s);
                    }
                }
                _ => {}
            }
        }
        text
    }

    /// Total elapsed time of the request in milliseconds.
    #[must_use]
    pub fn total_elapsed_ms(&self) -> Option<u64> {
        self.timings()
            .and_then(|t| t.total_elapsed)
            .filter(|ms| ms.is_finite() && *ms >= 0.0)
            .map(|ms| ms.round() as u64)
    }

    /// Time to the first streamed progress in milliseconds.
    #[must_use]
    pub fn first_progress_ms(&self) -> Option<u64> {
        self.timings()
            .and_then(|t| t.first_progress)
            .filter(|ms| ms.is_finite() && *ms >= 0.0)
            .map(|ms| ms.round() as u64)
    }

    /// Attached variables, empty when none.
    #[must_use]
    pub fn variables(&self) -> &[Value] {
        self.variable_data
            .as_ref()
            .map_or(&[], |data| data.variables.as_slice())
    }

    fn timings(&self) -> Option<&Timings> {
        self.result.as_ref().and_then(|r| r.timings.as_ref())
    }
}

/// The user's message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMessage {
    /// Plain text of the prompt.
    pub text: String,
    /// Structured parts (text runs, file references, slash commands...).
    #[serde(default, deserialize_with = "null_as_default")]
    pub parts: Vec<Value>,
}

/// Chat participant that handled a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAgent {
    /// Participant identifier, e.g. `github.copilot.editsAgent`.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Contributing extension.
    #[serde(default)]
    pub extension_id: Option<Value>,
}

/// Result block of a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestResult {
    /// Timing information.
    #[serde(default)]
    pub timings: Option<Timings>,
    /// Free-form metadata.
    #[serde(default)]
    pub metadata: Option<Value>,
}

/// Request timings in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timings {
    /// Time until the first streamed progress.
    #[serde(default)]
    pub first_progress: Option<f64>,
    /// Total elapsed time.
    #[serde(default)]
    pub total_elapsed: Option<f64>,
}

/// Container for context variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableData {
    /// Variables attached to the prompt.
    #[serde(default, deserialize_with = "null_as_default")]
    pub variables: Vec<Value>,
}

/// Treat an explicit `null` the same as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accept integer or floating-point epoch milliseconds.
fn lenient_millis<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let number = serde_json::Number::deserialize(deserializer)?;
    number_to_i64(&number).ok_or_else(|| serde::de::Error::custom("timestamp out of range"))
}

fn lenient_optional_millis<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let number = Option::<serde_json::Number>::deserialize(deserializer)?;
    Ok(number.as_ref().and_then(number_to_i64))
}

/// Any JSON number; fractions truncate and out-of-range values saturate.
fn lenient_version<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let number = serde_json::Number::deserialize(deserializer)?;
    Ok(number
        .as_i64()
        .or_else(|| number.as_f64().map(|v| v as i64))
        .unwrap_or_default())
}

fn number_to_i64(number: &serde_json::Number) -> Option<i64> {
    if let Some(v) = number.as_i64() {
        return Some(v);
    }
    number
        .as_f64()
        .filter(|v| v.is_finite() && v.abs() < i64::MAX as f64)
        .map(|v| v.trunc() as i64)
}
