//! Tolerant JSON repair for log export payloads
//!
//! Upstream exports occasionally concatenate two JSON objects without a
//! separator (`}{`) or carry literal control bytes inside string values.
//! The functions here recover the best-effort object instead of failing
//! the whole record. They never return errors: total failure is `None`.
//!
//! The brace span heuristic (first `{` to last `}`) is greedy and not
//! nesting-aware. It matches the corruption patterns seen in real exports
//! and is not a general JSON repair parser.

use regex::Regex;
use serde_json::Value;
use std::borrow::Cow;
use std::sync::OnceLock;

fn brace_span_re() -> &'static Regex {
    static BRACE_SPAN_RE: OnceLock<Regex> = OnceLock::new();
    BRACE_SPAN_RE.get_or_init(|| Regex::new(r"(?s)\{.*\}").expect("valid brace span regex"))
}

fn object_boundary_re() -> &'static Regex {
    static OBJECT_BOUNDARY_RE: OnceLock<Regex> = OnceLock::new();
    OBJECT_BOUNDARY_RE
        .get_or_init(|| Regex::new(r"\}\s*\{").expect("valid object boundary regex"))
}

/// Remove unescaped ASCII control characters (0x00-0x1F) except `\n` and `\r`
///
/// A control character survives only when the character right before it in
/// the input is a backslash.
pub fn clean_control_chars(input: &str) -> String {
    let mut cleaned = String::with_capacity(input.len());
    let mut prev: Option<char> = None;

    for c in input.chars() {
        let strippable = c <= '\u{1F}' && c != '\n' && c != '\r';
        if !(strippable && prev != Some('\\')) {
            cleaned.push(c);
        }
        prev = Some(c);
    }

    cleaned
}

/// Parse a possibly malformed JSON string
///
/// # Algorithm
/// 1. Strip unescaped control characters and parse directly
/// 2. Parse the greedy `{ ... }` span of the cleaned text
/// 3. Drop literal newlines and tabs from that span and parse again
pub fn fix(input: &str) -> Option<Value> {
    if input.is_empty() {
        return None;
    }

    let cleaned = clean_control_chars(input);
    if let Ok(value) = serde_json::from_str::<Value>(&cleaned) {
        return Some(value);
    }

    let span = brace_span_re().find(&cleaned)?.as_str();
    if let Ok(value) = serde_json::from_str::<Value>(&clean_control_chars(span)) {
        return Some(value);
    }

    let flattened: String = span.chars().filter(|c| *c != '\n' && *c != '\t').collect();
    serde_json::from_str::<Value>(&clean_control_chars(&flattened)).ok()
}

/// Repair a value that may already be structured
///
/// Objects and arrays pass through borrowed and unchanged, strings go
/// through [`fix`], everything else (null, numbers, booleans) yields `None`.
pub fn fix_value(input: &Value) -> Option<Cow<'_, Value>> {
    match input {
        Value::Object(_) | Value::Array(_) => Some(Cow::Borrowed(input)),
        Value::String(s) => fix(s).map(Cow::Owned),
        _ => None,
    }
}

/// Repair newline-delimited JSON, dropping blank and unrecoverable lines
pub fn fix_array(input: &str) -> Vec<Value> {
    input
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(fix)
        .collect()
}

/// Split a stream of concatenated objects (`}{`, `}\n{`, `} {`) and repair each piece
///
/// Pieces that cannot be recovered are dropped.
pub fn split_concatenated(input: &str) -> Vec<Value> {
    let mut pieces: Vec<&str> = Vec::new();
    let mut start = 0;

    for boundary in object_boundary_re().find_iter(input) {
        // Keep the closing brace with the left piece and the opening brace with the right one
        pieces.push(&input[start..boundary.start() + 1]);
        start = boundary.end() - 1;
    }
    pieces.push(&input[start..]);

    let total = pieces.len();
    let values: Vec<Value> = pieces
        .into_iter()
        .filter(|piece| !piece.trim().is_empty())
        .filter_map(fix)
        .collect();

    if values.len() < total {
        tracing::debug!(
            "Dropped {} unrecoverable object(s) from concatenated stream",
            total - values.len()
        );
    }

    values
}
