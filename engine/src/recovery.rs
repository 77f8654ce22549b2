//! Staged recovery of structured data from noisy model output.
//!
//! Models frequently wrap JSON in markdown fences, prose, or both, and the
//! JSON itself is often mildly broken (single quotes, bare keys, trailing
//! commas, raw newlines inside strings). [`recover`] runs a fixed chain of
//! repair stages, cheapest first, so a well-formed response pays almost
//! nothing while a pathological one gets progressively heavier treatment:
//!
//! 1. strip markdown fences and stray backticks;
//! 2. extract the first span matching the expected shape;
//! 3. lenient parse (bare keys, single quotes, trailing commas);
//! 4. aggressive repair (control characters, bad escapes, embedded
//!    newlines), then the lenient parse again;
//! 5. shape-specific heuristic extraction for known field markers;
//! 6. hand back the stripped text as [`Recovery::PartialText`].
//!
//! Recovery never fails: unusable text surfaces downstream as a validation
//! failure, not an error here.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Value, json};

/// The JSON shape the caller expects at the top level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonShape {
    Object,
    Array,
}

/// Outcome of one recovery run. Each stage runs only when the previous one
/// failed to produce `Parsed`.
#[derive(Debug, Clone, PartialEq)]
pub enum Recovery {
    Parsed(Value),
    PartialText(String),
}

impl Recovery {
    #[must_use]
    pub fn into_value(self) -> Option<Value> {
        match self {
            Recovery::Parsed(value) => Some(value),
            Recovery::PartialText(_) => None,
        }
    }
}

struct RepairPatterns {
    fence: Regex,
    object_span: Regex,
    array_span: Regex,
    trailing_comma: Regex,
    bare_key: Regex,
    single_quoted: Regex,
    invalid_escape: Regex,
    front_field: Regex,
    back_field: Regex,
}

static PATTERNS: LazyLock<RepairPatterns> = LazyLock::new(|| RepairPatterns {
    fence: Regex::new(r"(?m)^\s*```[A-Za-z0-9_-]*\s*$").expect("valid fence regex"),
    object_span: Regex::new(r"(?s)\{.*\}").expect("valid object span regex"),
    array_span: Regex::new(r"(?s)\[.*\]").expect("valid array span regex"),
    trailing_comma: Regex::new(r",\s*([}\]])").expect("valid trailing comma regex"),
    bare_key: Regex::new(r#"([{,]\s*)([A-Za-z_][A-Za-z0-9_-]*)\s*:"#).expect("valid bare key regex"),
    single_quoted: Regex::new(r"'([^'\\]*(?:\\.[^'\\]*)*)'").expect("valid single quote regex"),
    invalid_escape: Regex::new(r#"\\([^"\\/bfnrtu])"#).expect("valid escape regex"),
    front_field: Regex::new(r#"["']?frontHTML["']?\s*:\s*["']([^"']*)["']"#)
        .expect("valid front field regex"),
    back_field: Regex::new(r#"["']?backHTML["']?\s*:\s*["']([^"']*)["']"#)
        .expect("valid back field regex"),
});

/// Recover a JSON value of the expected shape from raw model text.
#[must_use]
pub fn recover(raw: &str, shape: JsonShape) -> Recovery {
    let stripped = strip_fences(raw);

    let span = extract_span(&stripped, shape).unwrap_or(&stripped);

    // Well-formed responses stop here.
    if let Ok(value) = serde_json::from_str::<Value>(span) {
        return Recovery::Parsed(value);
    }
    if let Some(value) = lenient_parse(span) {
        return Recovery::Parsed(value);
    }
    if let Some(value) = lenient_parse(&aggressive_repair(span)) {
        return Recovery::Parsed(value);
    }
    if let Some(value) = extract_flashcards(&stripped) {
        return Recovery::Parsed(value);
    }

    Recovery::PartialText(stripped)
}

/// Remove markdown code-fence lines and stray backticks.
fn strip_fences(raw: &str) -> String {
    let without_fences = PATTERNS.fence.replace_all(raw, "");
    without_fences.replace('`', "").trim().to_string()
}

/// The first `{...}` or `[...]` span matching the expected shape. Greedy:
/// from the first opener to the last closer, which tolerates nested
/// structures at the cost of trailing prose containing a closer.
fn extract_span(text: &str, shape: JsonShape) -> Option<&str> {
    let pattern = match shape {
        JsonShape::Object => &PATTERNS.object_span,
        JsonShape::Array => &PATTERNS.array_span,
    };
    pattern.find(text).map(|m| m.as_str())
}

/// Parse tolerating bare keys, single-quoted strings and trailing commas.
fn lenient_parse(text: &str) -> Option<Value> {
    let repaired = PATTERNS.bare_key.replace_all(text, "$1\"$2\":");
    let repaired = PATTERNS.single_quoted.replace_all(&repaired, "\"$1\"");
    let repaired = PATTERNS.trailing_comma.replace_all(&repaired, "$1");
    serde_json::from_str(&repaired).ok()
}

/// Heavier normalization for badly mangled output: drop control characters
/// (collapsing embedded newlines to spaces) and strip invalid escape
/// sequences. The lenient parse handles the rest.
fn aggressive_repair(text: &str) -> String {
    let cleaned: String = text
        .chars()
        .map(|c| if c == '\n' || c == '\r' || c == '\t' { ' ' } else { c })
        .filter(|c| !c.is_control())
        .collect();
    PATTERNS.invalid_escape.replace_all(&cleaned, "$1").into_owned()
}

/// Last-resort extraction for flashcard-shaped text: when both `frontHTML`
/// and `backHTML` markers are present, scan the fields out individually and
/// rebuild the array, filling whichever side of a pair is missing with a
/// deterministic placeholder instead of dropping the card.
fn extract_flashcards(text: &str) -> Option<Value> {
    let fronts: Vec<&str> = PATTERNS
        .front_field
        .captures_iter(text)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect();
    let backs: Vec<&str> = PATTERNS
        .back_field
        .captures_iter(text)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect();
    if fronts.is_empty() || backs.is_empty() {
        return None;
    }

    let count = fronts.len().max(backs.len());
    let cards: Vec<Value> = (0..count)
        .map(|i| {
            let front = fronts
                .get(i)
                .copied()
                .map_or_else(|| format!("Card {}", i + 1), ToString::to_string);
            let back = backs
                .get(i)
                .copied()
                .map_or_else(|| "(answer unavailable)".to_string(), ToString::to_string);
            json!({ "id": i + 1, "frontHTML": front, "backHTML": back })
        })
        .collect();
    Some(Value::Array(cards))
}

#[cfg(test)]
mod tests {
    use super::{JsonShape, Recovery, recover};
    use serde_json::json;

    fn parsed(raw: &str, shape: JsonShape) -> serde_json::Value {
        match recover(raw, shape) {
            Recovery::Parsed(v) => v,
            Recovery::PartialText(t) => panic!("expected parse, got partial text: {t}"),
        }
    }

    #[test]
    fn well_formed_object_is_a_no_op() {
        let raw = r#"{"title":"Sets","sections":[{"title":"Basics","content":"..."}]}"#;
        let value = parsed(raw, JsonShape::Object);
        assert_eq!(value, serde_json::from_str::<serde_json::Value>(raw).unwrap());
    }

    #[test]
    fn well_formed_array_is_a_no_op() {
        let raw = r#"[1, 2, 3]"#;
        assert_eq!(parsed(raw, JsonShape::Array), json!([1, 2, 3]));
    }

    #[test]
    fn fenced_json_parses() {
        let raw = "```json\n{\"a\": 1}\n```";
        assert_eq!(parsed(raw, JsonShape::Object), json!({"a": 1}));
    }

    #[test]
    fn trailing_comma_is_repaired() {
        assert_eq!(parsed(r#"{"a":1,}"#, JsonShape::Object), json!({"a": 1}));
    }

    #[test]
    fn prose_wrapped_array_span_is_extracted() {
        let raw = r#"Sure! Here's your flashcards: [{ "id":1, "frontHTML":"Q1","backHTML":"A1" }]"#;
        let value = parsed(raw, JsonShape::Array);
        assert_eq!(value, json!([{"id": 1, "frontHTML": "Q1", "backHTML": "A1"}]));
    }

    #[test]
    fn bare_keys_and_single_quotes_parse_leniently() {
        let raw = "{ title: 'Loops', sections: [] }";
        assert_eq!(
            parsed(raw, JsonShape::Object),
            json!({"title": "Loops", "sections": []})
        );
    }

    #[test]
    fn embedded_newlines_are_collapsed() {
        let raw = "{\"a\": \"line one\nline two\"}";
        assert_eq!(
            parsed(raw, JsonShape::Object),
            json!({"a": "line one line two"})
        );
    }

    #[test]
    fn invalid_escapes_are_normalized() {
        let raw = r#"{"path": "C:\Users\prompts"}"#;
        assert_eq!(
            parsed(raw, JsonShape::Object),
            json!({"path": "C:Usersprompts"})
        );
    }

    #[test]
    fn flashcard_markers_rescue_unparseable_text() {
        let raw = r#"
            card one: "frontHTML": "What is 2+2?" and "backHTML": "4" {{{
            card two: "frontHTML": "Capital of France?" but the back is missing
        "#;
        let value = parsed(raw, JsonShape::Array);
        let cards = value.as_array().unwrap();
        assert_eq!(cards.len(), 2);
        assert_eq!(cards[0]["frontHTML"], "What is 2+2?");
        assert_eq!(cards[0]["backHTML"], "4");
        assert_eq!(cards[1]["frontHTML"], "Capital of France?");
        assert_eq!(cards[1]["backHTML"], "(answer unavailable)");
    }

    #[test]
    fn hopeless_text_comes_back_as_partial() {
        let raw = "I'm sorry, I can't produce that right now.";
        match recover(raw, JsonShape::Object) {
            Recovery::PartialText(text) => assert!(text.contains("sorry")),
            Recovery::Parsed(v) => panic!("unexpected parse: {v}"),
        }
    }

    #[test]
    fn stray_backticks_are_stripped() {
        let raw = "`{\"a\": 1}`";
        assert_eq!(parsed(raw, JsonShape::Object), json!({"a": 1}));
    }
}
