//! Transcript to event normalization.
//!
//! The [`Transformer`] is a pure function layer: one parsed session plus the
//! path it came from becomes zero or more [`NormalizedEvent`]s. Its only
//! state is the version tag stamped on every event and the prompt-text
//! privacy flag, both fixed at construction.
//!
//! # Example
//!
//! ```rust,no_run
//! use vscode_chat_insights::transform::Transformer;
//! # fn demo(results: &[vscode_chat_insights::scanner::SessionScanResult]) {
//! let transformer = Transformer::default();
//! let events = transformer.transform_all(results);
//! # }
//! ```

mod classify;
mod context;
mod ids;
mod language;

pub use classify::{AgentRule, ClassificationRule, EventClassifier, KeywordRule};
pub use context::{host_process_id, instance_id, session_hierarchy, WorkspaceContext, UNKNOWN_WORKSPACE};
pub use ids::{anonymized_file_name, event_id, file_extension, EVENT_ID_LEN};
pub use language::{infer_language, language_for_extension, language_for_path, LanguageHint, LanguageSource};

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, instrument, warn};

use crate::error::{InsightsError, Result};
use crate::model::{
    EventType, NormalizedEvent, RawRequest, RawSession, SessionMetadata, VersionInfo, EVENT_SOURCE,
};
use crate::scanner::SessionScanResult;

/// Converts parsed transcripts into normalized events.
#[derive(Debug, Clone)]
pub struct Transformer {
    extension_version: String,
    include_prompt_text: bool,
    classifier: Arc<EventClassifier>,
}

impl Default for Transformer {
    fn default() -> Self {
        Self::new(crate::VERSION)
    }
}

impl Transformer {
    /// Transformer stamping `extension_version` on every event.
    pub fn new(extension_version: impl Into<String>) -> Self {
        Self {
            extension_version: extension_version.into(),
            include_prompt_text: false,
            classifier: Arc::new(EventClassifier::default()),
        }
    }

    /// Opt in to (or out of) copying raw prompt text into events.
    #[must_use]
    pub fn with_prompt_text(mut self, include: bool) -> Self {
        self.include_prompt_text = include;
        self
    }

    /// Replace the classification chain.
    #[must_use]
    pub fn with_classifier(mut self, classifier: EventClassifier) -> Self {
        self.classifier = Arc::new(classifier);
        self
    }

    /// Whether prompt text is copied into events.
    #[must_use]
    pub fn includes_prompt_text(&self) -> bool {
        self.include_prompt_text
    }

    /// Convert one request into an event.
    ///
    /// Fails when the request cannot be placed in time or has no id.
    pub fn to_event(
        &self,
        session: &RawSession,
        request: &RawRequest,
        workspace: &WorkspaceContext,
    ) -> Result<NormalizedEvent> {
        if request.request_id.trim().is_empty() {
            return Err(InsightsError::transform(&session.session_id, "", "empty request id"));
        }

        let timestamp = millis_to_utc(request.timestamp).ok_or_else(|| {
            InsightsError::transform(
                &session.session_id,
                &request.request_id,
                format!("timestamp {} is out of range", request.timestamp),
            )
        })?;
        // A broken creation date should not lose the request
        let created = millis_to_utc(session.creation_date).unwrap_or(timestamp);

        let hint = infer_language(request);
        let response_text = request.response_text();

        Ok(NormalizedEvent {
            id: event_id(&session.session_id, &request.request_id),
            timestamp,
            event_type: self.classifier.classify(request),
            source: EVENT_SOURCE.to_string(),
            hierarchy: session_hierarchy(&session.session_id, created, workspace),
            session_id: session.session_id.clone(),
            request_id: request.request_id.clone(),
            workspace_id: workspace.workspace_id.clone(),
            duration_ms: request.total_elapsed_ms(),
            time_to_first_progress_ms: request.first_progress_ms(),
            token_estimate: estimate_tokens(&request.message.text, &response_text),
            model_id: request.model_id.clone().filter(|m| !m.is_empty()),
            file_name: hint
                .as_ref()
                .and_then(|h| h.path.as_deref())
                .map(anonymized_file_name),
            language: hint.map(|h| h.language),
            prompt_text: self
                .include_prompt_text
                .then(|| request.message.text.clone()),
            cancelled: request.is_canceled,
            version: VersionInfo {
                extension_version: self.extension_version.clone(),
                schema_version: session.version,
            },
        })
    }

    /// Convert every request of a scanned session, skipping failures.
    #[instrument(skip(self, result), fields(session = %result.session.session_id))]
    pub fn transform_session(&self, result: &SessionScanResult) -> Vec<NormalizedEvent> {
        let workspace = WorkspaceContext::from_path(&result.path);
        let session = &result.session;

        let events: Vec<_> = session
            .requests
            .iter()
            .filter_map(|request| match self.to_event(session, request, &workspace) {
                Ok(event) => Some(event),
                Err(e) => {
                    warn!(error = %e, "Skipping request");
                    None
                }
            })
            .collect();

        debug!(
            requests = session.requests.len(),
            events = events.len(),
            workspace = %workspace.workspace_id,
            "Transformed session"
        );
        events
    }

    /// Convert many scanned sessions, preserving their order.
    pub fn transform_all(&self, results: &[SessionScanResult]) -> Vec<NormalizedEvent> {
        results
            .iter()
            .flat_map(|result| self.transform_session(result))
            .collect()
    }

    /// Summarize a session.
    pub fn extract_metadata(&self, session: &RawSession, workspace: &WorkspaceContext) -> SessionMetadata {
        let mut meta = SessionMetadata {
            session_id: session.session_id.clone(),
            workspace_id: workspace.workspace_id.clone(),
            request_count: session.requests.len(),
            ..SessionMetadata::default()
        };

        let mut elapsed_total = 0u64;
        let mut elapsed_count = 0usize;

        for request in &session.requests {
            let response_chars = request.response_text().chars().count();
            meta.total_response_chars += response_chars;
            meta.total_token_estimate += estimate_tokens_from_chars(request.message.text.chars().count() + response_chars);

            if let Some(hint) = infer_language(request) {
                meta.languages.insert(hint.language);
            }
            if let Some(model) = request.model_id.as_ref().filter(|m| !m.is_empty()) {
                meta.models.insert(model.clone());
            }
            *meta
                .event_types
                .entry(self.classifier.classify(request))
                .or_insert(0) += 1;

            if let Some(ms) = request.total_elapsed_ms() {
                elapsed_total += ms;
                elapsed_count += 1;
            }

            meta.has_code_citations |= !request.code_citations.is_empty();
            meta.has_content_references |= !request.content_references.is_empty();
            meta.has_followups |= !request.followups.is_empty();

            if let Some(ts) = millis_to_utc(request.timestamp) {
                meta.start_time = Some(meta.start_time.map_or(ts, |s| s.min(ts)));
                meta.end_time = Some(meta.end_time.map_or(ts, |e| e.max(ts)));
            }
        }

        if meta.request_count > 0 {
            meta.average_response_chars = meta.total_response_chars as f64 / meta.request_count as f64;
        }
        if elapsed_count > 0 {
            meta.average_response_time_ms = Some(elapsed_total as f64 / elapsed_count as f64);
        }
        meta.event_types.sort_by(|a, _, b, _| a.cmp(b));
        meta
    }
}

/// Rough token count: one token per four characters, rounded.
#[must_use]
pub fn estimate_tokens(message: &str, response: &str) -> u64 {
    estimate_tokens_from_chars(message.chars().count() + response.chars().count())
}

fn estimate_tokens_from_chars(chars: usize) -> u64 {
    (chars as f64 / 4.0).round() as u64
}

fn millis_to_utc(millis: i64) -> Option<DateTime<Utc>> {
    if millis <= 0 {
        return None;
    }
    DateTime::from_timestamp_millis(millis)
}

/// Count of events per type, in [`EventType::ALL`] order.
#[must_use]
pub fn count_by_type(events: &[NormalizedEvent]) -> [(EventType, usize); 4] {
    EventType::ALL.map(|ty| (ty, events.iter().filter(|e| e.event_type == ty).count()))
}
