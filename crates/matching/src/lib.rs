//! Match payload extraction.
//!
//! The matchmaker persona is asked to end its final answer with a JSON
//! object of the shape `{"matches": [...]}`. Models comply imperfectly:
//! the object may sit inside a fenced code block, trail free-form prose,
//! be truncated by a token limit, or be missing entirely. [`extract`] is
//! total over arbitrary input and never panics; anything that does not
//! yield a well-formed payload degrades to plain text or `Malformed`.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// One suggested person, as rendered on a match card.
///
/// `tech_skills` and `interests` are comma-joined strings as the model
/// emits them; [`split_tags`] turns them into chips.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSuggestion {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default)]
    pub job_position: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub tech_skills: String,
    #[serde(default)]
    pub interests: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_starter: Option<String>,
}

/// The outcome of scanning a final answer for a match payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchExtraction {
    /// A well-formed `{"matches": [...]}` payload was found.
    Matches(Vec<MatchSuggestion>),
    /// No match payload present; render the text as-is.
    PlainText,
    /// A payload was attempted but is broken (truncated or invalid);
    /// render the text as-is and ignore the fragment.
    Malformed,
}

#[derive(Deserialize)]
struct MatchesPayload {
    matches: Vec<MatchSuggestion>,
}

/// Scan `text` for a `{"matches": [...]}` payload.
///
/// Looks inside a fenced ```json block first, then for a bare balanced
/// JSON object anywhere in the text. Leading prose is fine.
pub fn extract(text: &str) -> MatchExtraction {
    let candidate = fenced_block(text).or_else(|| balanced_object(text));

    let Some(candidate) = candidate else {
        // A marker with no parsable object around it means the model
        // started a payload it never finished.
        if text.contains("\"matches\"") {
            return MatchExtraction::Malformed;
        }
        return MatchExtraction::PlainText;
    };

    if !candidate.contains("\"matches\"") {
        return MatchExtraction::PlainText;
    }

    match serde_json::from_str::<MatchesPayload>(candidate) {
        Ok(payload) => {
            debug!(count = payload.matches.len(), "extracted match payload");
            MatchExtraction::Matches(payload.matches)
        }
        Err(_) => MatchExtraction::Malformed,
    }
}

/// Split a comma-joined tag string into trimmed, non-empty tags.
pub fn split_tags(joined: &str) -> Vec<String> {
    joined
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}

/// The contents of the first fenced ```json (or plain ```) block, if any.
fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after_fence = &text[start + 3..];
    let body_start = after_fence
        .strip_prefix("json")
        .unwrap_or(after_fence)
        .trim_start_matches(['\r', '\n']);
    let end = body_start.find("```")?;
    Some(body_start[..end].trim())
}

/// The first balanced `{...}` object in the text that survives brace
/// counting, string-literal aware. Truncated objects yield nothing.
fn balanced_object(text: &str) -> Option<&str> {
    let mut search_from = 0;
    while let Some(rel) = text[search_from..].find('{') {
        let open = search_from + rel;
        if let Some(end) = balanced_end(&text[open..]) {
            return Some(&text[open..open + end]);
        }
        search_from = open + 1;
    }
    None
}

/// Byte length of the balanced object starting at the `{` at index 0.
fn balanced_end(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in s.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i + c.len_utf8());
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const ANA_PAYLOAD: &str = r#"{"matches":[{"id":"1","name":"Ana","job_position":"Dev","company":"Acme","tech_skills":"Go, Rust","interests":"Chess"}]}"#;

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(extract("Hola, ¿en qué puedo ayudarte?"), MatchExtraction::PlainText);
    }

    #[test]
    fn bare_payload_with_leading_prose() {
        let text = format!("Hello {ANA_PAYLOAD}");
        let MatchExtraction::Matches(matches) = extract(&text) else {
            panic!("expected matches");
        };
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].name, "Ana");
        assert_eq!(matches[0].id, "1");
        assert_eq!(split_tags(&matches[0].tech_skills), vec!["Go", "Rust"]);
        assert_eq!(split_tags(&matches[0].interests), vec!["Chess"]);
    }

    #[test]
    fn fenced_json_block() {
        let text = format!("Aquí tienes:\n```json\n{ANA_PAYLOAD}\n```\n¡Suerte!");
        let MatchExtraction::Matches(matches) = extract(&text) else {
            panic!("expected matches");
        };
        assert_eq!(matches[0].company, "Acme");
    }

    #[test]
    fn fenced_block_without_language_tag() {
        let text = format!("```\n{ANA_PAYLOAD}\n```");
        assert!(matches!(extract(&text), MatchExtraction::Matches(_)));
    }

    #[test]
    fn truncated_payload_is_malformed() {
        let truncated = &ANA_PAYLOAD[..ANA_PAYLOAD.len() - 20];
        let text = format!("Te recomiendo a: {truncated}");
        assert_eq!(extract(&text), MatchExtraction::Malformed);
    }

    #[test]
    fn wrong_shape_is_malformed() {
        assert_eq!(
            extract(r#"{"matches": "not an array"}"#),
            MatchExtraction::Malformed
        );
    }

    #[test]
    fn unrelated_json_object_is_plain_text() {
        assert_eq!(
            extract(r#"El resultado es {"total": 42}"#),
            MatchExtraction::PlainText
        );
    }

    #[test]
    fn empty_matches_array_is_valid() {
        let MatchExtraction::Matches(matches) = extract(r#"{"matches": []}"#) else {
            panic!("expected matches");
        };
        assert!(matches.is_empty());
    }

    #[test]
    fn optional_fields_default() {
        let text = r#"{"matches":[{"name":"Bea"}]}"#;
        let MatchExtraction::Matches(matches) = extract(text) else {
            panic!("expected matches");
        };
        assert_eq!(matches[0].name, "Bea");
        assert!(matches[0].id.is_empty());
        assert!(matches[0].image.is_none());
        assert!(matches[0].conversation_starter.is_none());
    }

    #[test]
    fn braces_inside_strings_do_not_confuse_the_scanner() {
        let text = r#"{"matches":[{"name":"Ana","conversation_starter":"¿Qué opinas de {} en Rust?"}]}"#;
        let MatchExtraction::Matches(matches) = extract(text) else {
            panic!("expected matches");
        };
        assert_eq!(
            matches[0].conversation_starter.as_deref(),
            Some("¿Qué opinas de {} en Rust?")
        );
    }

    #[test]
    fn total_over_hostile_input() {
        for input in [
            "",
            "{",
            "}",
            "```json",
            "```json\n{\"matches\":",
            "\"matches\"",
            "{\"a\": {\"b\": 1}",
            "🦀🦀🦀",
        ] {
            // Must not panic, whatever the verdict.
            let _ = extract(input);
        }
    }

    #[test]
    fn split_tags_trims_and_drops_empties() {
        assert_eq!(split_tags("Go, Rust , ,TypeScript"), vec!["Go", "Rust", "TypeScript"]);
        assert!(split_tags("").is_empty());
        assert!(split_tags(" , ").is_empty());
    }
}
