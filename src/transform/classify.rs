//! Event-type classification.
//!
//! Classification is an ordered chain of [`ClassificationRule`]s; the first
//! rule that returns a type wins and [`EventType::Chat`] is the fallback.
//! The default chain is:
//!
//! 1. agent id containing `edit` → edit, containing `explain` → explain
//! 2. edit keywords in the prompt
//! 3. explain keywords in the prompt
//! 4. completion keywords in the prompt

use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::{EventType, RawRequest};

static EDIT_KEYWORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(fix|edit|change|modify|refactor|rename|update|replace|rewrite|remove|delete|correct)\b")
        .expect("edit keyword pattern is valid")
});

static EXPLAIN_KEYWORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(explain|describe|understand|meaning|what\s+(does|is|are)|how\s+(does|do)|why)\b")
        .expect("explain keyword pattern is valid")
});

static COMPLETION_KEYWORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(complete|generate|create|write|implement|add|build|scaffold)\b")
        .expect("completion keyword pattern is valid")
});

/// One step of the classification chain.
pub trait ClassificationRule: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Classify the request, or `None` to defer to the next rule.
    fn classify(&self, request: &RawRequest) -> Option<EventType>;
}

/// Classifies by the handling agent's id.
#[derive(Debug, Default, Clone, Copy)]
pub struct AgentRule;

impl ClassificationRule for AgentRule {
    fn name(&self) -> &'static str {
        "agent"
    }

    fn classify(&self, request: &RawRequest) -> Option<EventType> {
        let id = request.agent.as_ref()?.id.to_ascii_lowercase();
        if id.contains("edit") {
            Some(EventType::Edit)
        } else if id.contains("explain") {
            Some(EventType::Explain)
        } else {
            None
        }
    }
}

/// Classifies by a keyword pattern in the prompt text.
#[derive(Debug, Clone, Copy)]
pub struct KeywordRule {
    name: &'static str,
    event_type: EventType,
    pattern: &'static Lazy<Regex>,
}

impl KeywordRule {
    /// Edit keywords (`fix`, `refactor`, `rename`...).
    #[must_use]
    pub fn edit() -> Self {
        Self {
            name: "edit-keywords",
            event_type: EventType::Edit,
            pattern: &EDIT_KEYWORDS,
        }
    }

    /// Explain keywords (`explain`, `what does`, `why`...).
    #[must_use]
    pub fn explain() -> Self {
        Self {
            name: "explain-keywords",
            event_type: EventType::Explain,
            pattern: &EXPLAIN_KEYWORDS,
        }
    }

    /// Completion keywords (`generate`, `write`, `implement`...).
    #[must_use]
    pub fn completion() -> Self {
        Self {
            name: "completion-keywords",
            event_type: EventType::Completion,
            pattern: &COMPLETION_KEYWORDS,
        }
    }
}

impl ClassificationRule for KeywordRule {
    fn name(&self) -> &'static str {
        self.name
    }

    fn classify(&self, request: &RawRequest) -> Option<EventType> {
        self.pattern
            .is_match(&request.message.text)
            .then_some(self.event_type)
    }
}

/// Ordered classification chain.
pub struct EventClassifier {
    rules: Vec<Box<dyn ClassificationRule>>,
}

impl EventClassifier {
    /// Chain with custom rules, evaluated in order.
    #[must_use]
    pub fn with_rules(rules: Vec<Box<dyn ClassificationRule>>) -> Self {
        Self { rules }
    }

    /// Classify a request, defaulting to [`EventType::Chat`].
    #[must_use]
    pub fn classify(&self, request: &RawRequest) -> EventType {
        self.rules
            .iter()
            .find_map(|rule| rule.classify(request))
            .unwrap_or(EventType::Chat)
    }

    /// Names of the rules in evaluation order.
    pub fn rule_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.rules.iter().map(|rule| rule.name())
    }
}

impl Default for EventClassifier {
    fn default() -> Self {
        Self::with_rules(vec![
            Box::new(AgentRule),
            Box::new(KeywordRule::edit()),
            Box::new(KeywordRule::explain()),
            Box::new(KeywordRule::completion()),
        ])
    }
}

impl std::fmt::Debug for EventClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.rule_names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn request(text: &str, agent: Option<&str>) -> RawRequest {
        let mut value = json!({
            "requestId": "r",
            "timestamp": 1,
            "message": { "text": text }
        });
        if let Some(agent) = agent {
            value["agent"] = json!({ "id": agent });
        }
        serde_json::from_value(value).unwrap()
    }

    #[rstest]
    #[case("fix the bug", None, EventType::Edit)]
    #[case("Please REFACTOR this module", None, EventType::Edit)]
    #[case("explain this function", None, EventType::Explain)]
    #[case("what does this regex do", None, EventType::Explain)]
    #[case("generate unit tests", None, EventType::Completion)]
    #[case("hello there", None, EventType::Chat)]
    #[case("", None, EventType::Chat)]
    #[case("hello", Some("github.copilot.editsAgent"), EventType::Edit)]
    #[case("fix it", Some("vscode.explainer"), EventType::Explain)]
    #[case("explain", Some("github.copilot.default"), EventType::Explain)]
    fn test_default_chain(#[case] text: &str, #[case] agent: Option<&str>, #[case] expected: EventType) {
        let classifier = EventClassifier::default();
        assert_eq!(classifier.classify(&request(text, agent)), expected);
    }

    #[test]
    fn test_edit_wins_over_explain_and_completion() {
        let classifier = EventClassifier::default();
        let req = request("explain why and then fix and write the test", None);
        assert_eq!(classifier.classify(&req), EventType::Edit);
    }

    #[test]
    fn test_keywords_need_word_boundaries() {
        let classifier = EventClassifier::default();
        // "prefix" contains "fix", "whyever" contains "why"
        assert_eq!(classifier.classify(&request("prefix whyever", None)), EventType::Chat);
    }

    #[test]
    fn test_rule_order() {
        let names: Vec<_> = EventClassifier::default().rule_names().collect();
        assert_eq!(names, ["agent", "edit-keywords", "explain-keywords", "completion-keywords"]);
    }
}
