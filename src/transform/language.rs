//! Programming-language inference for a request.
//!
//! Sources are tried in order and the first hit wins:
//!
//! 1. content references attached to the response
//! 2. variables of kind `file` attached to the prompt
//! 3. file references in the message (`#file:` parts, quoted paths)
//! 4. language-specific patterns in the prompt text
//!
//! Finding nothing is normal; plenty of prompts are not about code.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use super::ids::file_extension;
use crate::model::RawRequest;

/// Where the language came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LanguageSource {
    /// A content reference path.
    ContentReference,
    /// A `file` variable.
    FileVariable,
    /// A file mentioned in the message.
    MessagePart,
    /// A text pattern.
    TextPattern,
}

/// An inferred language and, for path-based hits, the path it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageHint {
    /// Language identifier (`rust`, `typescript`...).
    pub language: String,
    /// Path that produced the hint.
    pub path: Option<String>,
    /// Which source matched.
    pub source: LanguageSource,
}

/// File extension to language identifier.
const EXTENSION_LANGUAGES: &[(&str, &str)] = &[
    ("rs", "rust"),
    ("ts", "typescript"),
    ("tsx", "typescript"),
    ("mts", "typescript"),
    ("js", "javascript"),
    ("jsx", "javascript"),
    ("mjs", "javascript"),
    ("cjs", "javascript"),
    ("py", "python"),
    ("pyi", "python"),
    ("ipynb", "python"),
    ("go", "go"),
    ("java", "java"),
    ("kt", "kotlin"),
    ("kts", "kotlin"),
    ("scala", "scala"),
    ("cs", "csharp"),
    ("fs", "fsharp"),
    ("c", "c"),
    ("h", "c"),
    ("cc", "cpp"),
    ("cpp", "cpp"),
    ("cxx", "cpp"),
    ("hh", "cpp"),
    ("hpp", "cpp"),
    ("rb", "ruby"),
    ("php", "php"),
    ("swift", "swift"),
    ("m", "objective-c"),
    ("dart", "dart"),
    ("lua", "lua"),
    ("r", "r"),
    ("sh", "shellscript"),
    ("bash", "shellscript"),
    ("zsh", "shellscript"),
    ("ps1", "powershell"),
    ("sql", "sql"),
    ("html", "html"),
    ("htm", "html"),
    ("css", "css"),
    ("scss", "scss"),
    ("less", "less"),
    ("vue", "vue"),
    ("svelte", "svelte"),
    ("json", "json"),
    ("jsonc", "json"),
    ("yaml", "yaml"),
    ("yml", "yaml"),
    ("toml", "toml"),
    ("xml", "xml"),
    ("md", "markdown"),
];

/// Language for a file extension (case-insensitive).
#[must_use]
pub fn language_for_extension(ext: &str) -> Option<&'static str> {
    let ext = ext.to_ascii_lowercase();
    EXTENSION_LANGUAGES
        .iter()
        .find(|(candidate, _)| *candidate == ext)
        .map(|(_, language)| *language)
}

/// Language for a path, by extension.
#[must_use]
pub fn language_for_path(path: &str) -> Option<&'static str> {
    file_extension(path).and_then(|ext| language_for_extension(&ext))
}

/// JSON pointers tried on each content reference.
const REFERENCE_PATH_POINTERS: &[&str] = &[
    "/reference/uri/path",
    "/reference/uri/fsPath",
    "/reference/fsPath",
    "/reference/path",
    "/reference/location/uri/path",
    "/reference/location/uri/fsPath",
    "/uri/path",
    "/fsPath",
];

/// JSON pointers tried on each `file` variable.
const VARIABLE_PATH_POINTERS: &[&str] = &[
    "/value/uri/path",
    "/value/uri/fsPath",
    "/value/fsPath",
    "/value/path",
    "/value/location/uri/path",
];

static FILE_MENTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"#file:([^\s`'\x22]+)").expect("file mention pattern is valid"));

static QUOTED_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[`'\x22]([\w./\\-]*\w\.[A-Za-z0-9]{1,10})[`'\x22]").expect("quoted path pattern is valid")
});

/// Prompt patterns, most specific first.
static TEXT_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    [
        ("typescript", r"(?i)\btypescript\b|\binterface\s+\w+\s*\{|:\s*(string|number|boolean)\s*[;,)=]"),
        ("javascript", r"(?i)\bjavascript\b|\bnode\.?js\b|\bconsole\.log\(|\brequire\(['\x22]"),
        ("python", r"(?i)\bpython\b|\bdef\s+\w+\s*\(.*\)\s*:|\bpip\s+install\b|\bself\.\w+"),
        ("rust", r"(?i)\brust\b|\bcargo\b|\bfn\s+\w+\s*[(<]|\blet\s+mut\b|\bimpl\s+\w+"),
        ("go", r"(?i)\bgolang\b|\bfunc\s+(\(\w+\s+\*?\w+\)\s*)?\w+\s*\(|\bpackage\s+main\b"),
        ("java", r"(?i)\bjava\b|\bpublic\s+(static\s+)?(class|void)\b|\bSystem\.out\.println\b"),
        ("csharp", r"(?i)c#|\bcsharp\b|\busing\s+System\b|\.net\b"),
        ("cpp", r"(?i)c\+\+|\bcpp\b|#include\s*<|\bstd::"),
        ("php", r"(?i)<\?php|\bphp\b|\$this->"),
        ("ruby", r"(?i)\bruby\b|\brails\b|\bputs\s"),
        ("sql", r"(?i)\bsql\b|\bselect\s+.+\s+from\b|\binsert\s+into\b|\bcreate\s+table\b"),
        ("shellscript", r"(?i)\bbash\b|\bshell\s+script\b|^#!/bin/(ba)?sh"),
    ]
    .into_iter()
    .map(|(language, pattern)| (language, Regex::new(pattern).expect("language pattern is valid")))
    .collect()
});

/// Run the inference chain on a request.
#[must_use]
pub fn infer_language(request: &RawRequest) -> Option<LanguageHint> {
    from_content_references(request)
        .or_else(|| from_file_variables(request))
        .or_else(|| from_message(request))
        .or_else(|| from_text_patterns(&request.message.text))
}

fn path_hint(path: &str, source: LanguageSource) -> Option<LanguageHint> {
    language_for_path(path).map(|language| LanguageHint {
        language: language.to_string(),
        path: Some(path.to_string()),
        source,
    })
}

fn first_path_hint(value: &Value, pointers: &[&str], source: LanguageSource) -> Option<LanguageHint> {
    pointers
        .iter()
        .filter_map(|pointer| value.pointer(pointer).and_then(Value::as_str))
        .find_map(|path| path_hint(path, source))
}

fn from_content_references(request: &RawRequest) -> Option<LanguageHint> {
    request
        .content_references
        .iter()
        .find_map(|reference| first_path_hint(reference, REFERENCE_PATH_POINTERS, LanguageSource::ContentReference))
}

fn from_file_variables(request: &RawRequest) -> Option<LanguageHint> {
    request
        .variables()
        .iter()
        .filter(|variable| variable.get("kind").and_then(Value::as_str) == Some("file"))
        .find_map(|variable| {
            first_path_hint(variable, VARIABLE_PATH_POINTERS, LanguageSource::FileVariable).or_else(|| {
                // Older transcripts only carry `name: "file:main.rs"`
                let name = variable.get("name").and_then(Value::as_str)?;
                path_hint(name.trim_start_matches("file:"), LanguageSource::FileVariable)
            })
        })
}

fn from_message(request: &RawRequest) -> Option<LanguageHint> {
    let part_texts = request
        .message
        .parts
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str));

    std::iter::once(request.message.text.as_str())
        .chain(part_texts)
        .find_map(|text| {
            FILE_MENTION
                .captures_iter(text)
                .chain(QUOTED_PATH.captures_iter(text))
                .filter_map(|caps| caps.get(1))
                .find_map(|m| path_hint(m.as_str(), LanguageSource::MessagePart))
        })
}

fn from_text_patterns(text: &str) -> Option<LanguageHint> {
    TEXT_PATTERNS
        .iter()
        .find(|(_, pattern)| pattern.is_match(text))
        .map(|(language, _)| LanguageHint {
            language: (*language).to_string(),
            path: None,
            source: LanguageSource::TextPattern,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    fn request(extra: Value) -> RawRequest {
        let mut value = json!({
            "requestId": "r",
            "timestamp": 1,
            "message": { "text": "" }
        });
        for (k, v) in extra.as_object().unwrap() {
            value[k] = v.clone();
        }
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_content_reference_wins() {
        let req = request(json!({
            "message": { "text": "how does main.py work in rust" },
            "contentReferences": [
                { "kind": "reference", "reference": { "uri": { "path": "/repo/src/lib.rs" } } }
            ]
        }));
        let hint = infer_language(&req).unwrap();
        assert_eq!(hint.language, "rust");
        assert_eq!(hint.source, LanguageSource::ContentReference);
        assert_eq!(hint.path.as_deref(), Some("/repo/src/lib.rs"));
    }

    #[test]
    fn test_reference_location_path() {
        let req = request(json!({
            "contentReferences": [
                { "reference": { "location": { "uri": { "fsPath": "C:\\app\\Form.cs" } } } }
            ]
        }));
        assert_eq!(infer_language(&req).unwrap().language, "csharp");
    }

    #[test]
    fn test_file_variable() {
        let req = request(json!({
            "variableData": { "variables": [
                { "kind": "tool", "name": "search" },
                { "kind": "file", "name": "file:app.tsx", "value": { "uri": { "path": "/w/app.tsx" } } }
            ]}
        }));
        let hint = infer_language(&req).unwrap();
        assert_eq!(hint.language, "typescript");
        assert_eq!(hint.source, LanguageSource::FileVariable);
    }

    #[test]
    fn test_file_variable_name_only() {
        let req = request(json!({
            "variableData": { "variables": [ { "kind": "file", "name": "file:server.go" } ] }
        }));
        assert_eq!(infer_language(&req).unwrap().language, "go");
    }

    #[rstest]
    #[case("look at #file:utils/helpers.py please", "python")]
    #[case("what is wrong in `src/App.vue`", "vue")]
    #[case("rename 'build.gradle.kts' targets", "kotlin")]
    fn test_message_references(#[case] text: &str, #[case] expected: &str) {
        let req = request(json!({ "message": { "text": text } }));
        let hint = infer_language(&req).unwrap();
        assert_eq!(hint.language, expected);
        assert_eq!(hint.source, LanguageSource::MessagePart);
    }

    #[test]
    fn test_message_parts_are_searched() {
        let req = request(json!({
            "message": { "text": "look here", "parts": [ { "kind": "text", "text": "#file:index.js" } ] }
        }));
        assert_eq!(infer_language(&req).unwrap().language, "javascript");
    }

    #[rstest]
    #[case("write a typescript interface Foo {", "typescript")]
    #[case("def parse(self, x): returns wrong", "python")]
    #[case("why does let mut x not compile", "rust")]
    #[case("SELECT name FROM users is slow", "sql")]
    #[case("how do I use std::vector", "cpp")]
    #[case("my javascript promise never resolves", "javascript")]
    #[case("public static void main in Java", "java")]
    fn test_text_patterns(#[case] text: &str, #[case] expected: &str) {
        let req = request(json!({ "message": { "text": text } }));
        let hint = infer_language(&req).unwrap();
        assert_eq!(hint.language, expected);
        assert_eq!(hint.source, LanguageSource::TextPattern);
        assert!(hint.path.is_none());
    }

    #[test]
    fn test_no_language() {
        let req = request(json!({ "message": { "text": "fix the bug" } }));
        assert_eq!(infer_language(&req), None);
    }

    #[test]
    fn test_unknown_extension_falls_through() {
        let req = request(json!({
            "message": { "text": "in rust" },
            "contentReferences": [ { "reference": { "uri": { "path": "/w/data.bin" } } } ]
        }));
        let hint = infer_language(&req).unwrap();
        assert_eq!(hint.language, "rust");
        assert_eq!(hint.source, LanguageSource::TextPattern);
    }
}
