//! Structural validation of transcript JSON.
//!
//! Runs on the untyped document before deserialization so that rejections
//! carry a precise reason (which field, which request) instead of a serde
//! error position.

use std::path::Path;

use serde_json::Value;

use crate::error::{InsightsError, Result};

/// Check the fields every consumer relies on.
///
/// Required: non-empty string `sessionId`; numeric `creationDate` and
/// `version`; for each request a string `requestId`, a numeric `timestamp`,
/// a `message` object with string `text`, and a string `agent.id` whenever
/// `agent` is present. `modelId` is optional.
pub fn validate_session(path: &Path, value: &Value) -> Result<()> {
    let invalid = |reason: String| InsightsError::invalid(path, reason);

    let Some(root) = value.as_object() else {
        return Err(invalid("document is not an object".to_string()));
    };

    match root.get("sessionId") {
        Some(Value::String(id)) if !id.trim().is_empty() => {}
        Some(Value::String(_)) => return Err(invalid("sessionId is empty".to_string())),
        _ => return Err(invalid("sessionId is missing or not a string".to_string())),
    }

    for field in ["creationDate", "version"] {
        if !root.get(field).is_some_and(Value::is_number) {
            return Err(invalid(format!("{field} is missing or not a number")));
        }
    }

    let requests = match root.get("requests") {
        None | Some(Value::Null) => return Ok(()),
        Some(Value::Array(requests)) => requests,
        Some(_) => return Err(invalid("requests is not an array".to_string())),
    };

    for (index, request) in requests.iter().enumerate() {
        validate_request(request).map_err(|reason| invalid(format!("request {index}: {reason}")))?;
    }

    Ok(())
}

fn validate_request(request: &Value) -> std::result::Result<(), String> {
    let Some(request) = request.as_object() else {
        return Err("not an object".to_string());
    };

    if !request.get("requestId").is_some_and(Value::is_string) {
        return Err("requestId is missing or not a string".to_string());
    }
    if !request.get("timestamp").is_some_and(Value::is_number) {
        return Err("timestamp is missing or not a number".to_string());
    }

    let text = request
        .get("message")
        .and_then(Value::as_object)
        .and_then(|message| message.get("text"));
    if !text.is_some_and(Value::is_string) {
        return Err("message.text is missing or not a string".to_string());
    }

    match request.get("agent") {
        None | Some(Value::Null) => {}
        Some(Value::Object(agent)) if agent.get("id").is_some_and(Value::is_string) => {}
        Some(_) => return Err("agent.id is missing or not a string".to_string()),
    }

    match request.get("modelId") {
        None | Some(Value::Null | Value::String(_)) => Ok(()),
        Some(_) => Err("modelId is not a string".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn valid() -> Value {
        json!({
            "sessionId": "abc",
            "creationDate": 1700000000000_i64,
            "version": 3,
            "requests": [{
                "requestId": "r1",
                "timestamp": 1700000001000_i64,
                "message": { "text": "fix the bug" },
                "agent": { "id": "x" },
                "modelId": "gpt-4o"
            }]
        })
    }

    #[test]
    fn test_valid_session_passes() {
        assert!(validate_session(Path::new("a.json"), &valid()).is_ok());
    }

    #[test]
    fn test_model_and_agent_are_optional() {
        let mut doc = valid();
        doc["requests"][0].as_object_mut().unwrap().remove("agent");
        doc["requests"][0]["modelId"] = Value::Null;
        assert!(validate_session(Path::new("a.json"), &doc).is_ok());
    }

    #[test]
    fn test_missing_requests_is_allowed() {
        let mut doc = valid();
        doc.as_object_mut().unwrap().remove("requests");
        assert!(validate_session(Path::new("a.json"), &doc).is_ok());
    }

    #[rstest]
    #[case::empty_session_id("/sessionId", json!(""))]
    #[case::numeric_session_id("/sessionId", json!(42))]
    #[case::string_creation_date("/creationDate", json!("2024-01-01"))]
    #[case::string_version("/version", json!("3"))]
    #[case::requests_object("/requests", json!({}))]
    #[case::numeric_request_id("/requests/0/requestId", json!(7))]
    #[case::string_timestamp("/requests/0/timestamp", json!("now"))]
    #[case::missing_text("/requests/0/message", json!({ "parts": [] }))]
    #[case::agent_without_id("/requests/0/agent", json!({ "name": "copilot" }))]
    #[case::numeric_model("/requests/0/modelId", json!(4))]
    fn test_invalid_documents(#[case] pointer: &str, #[case] replacement: Value) {
        let mut doc = valid();
        *doc.pointer_mut(pointer).unwrap() = replacement;

        let err = validate_session(Path::new("bad.json"), &doc).unwrap_err();
        assert!(matches!(err, InsightsError::InvalidSession { .. }), "{err}");
    }

    #[test]
    fn test_reason_names_request_index() {
        let mut doc = valid();
        doc["requests"][0]["timestamp"] = json!(null);
        let err = validate_session(Path::new("bad.json"), &doc).unwrap_err();
        assert!(err.to_string().contains("request 0: timestamp"));
    }
}
