//! Best-effort decoding of structured data embedded in model output.
//!
//! Models are asked for JSON or list literals but answer with prose, code
//! fences and Python syntax often enough that nothing here ever fails: the
//! callers get an empty result or a documented fallback instead.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use delver_core::types::RankedDoc;

fn object_array_start() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"\[\s*\{").ok())
        .as_ref()
}

fn fenced_block_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?s)```[a-zA-Z]*\s*(.*?)```").ok())
        .as_ref()
}

/// Find the first `[ { ... } ]` span in `text` and decode it.
///
/// The span starts at the first `[` followed by `{` and ends at its matching
/// `]`, so nested arrays of objects stay inside it. Brackets within quoted
/// strings are ignored. Returns only the object elements; anything that
/// fails to decode yields an empty vector.
pub fn extract_json_array(text: &str) -> Vec<Value> {
    let Some(candidate) = object_array_start()
        .and_then(|re| re.find(text))
        .and_then(|m| balanced_span(&text[m.start()..]))
    else {
        debug!("No JSON array found in model output");
        return Vec::new();
    };

    match decode_lenient::<Vec<Value>>(candidate) {
        Some(values) => values.into_iter().filter(Value::is_object).collect(),
        None => {
            warn!(chars = candidate.len(), "Embedded JSON array did not decode");
            Vec::new()
        }
    }
}

/// The prefix of `text` (which starts with an opening bracket) up to and
/// including the bracket that closes it.
fn balanced_span(text: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (idx, c) in text.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '[' | '{' => depth += 1,
            ']' | '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(&text[..idx + c.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Decode the reranker's answer into documents, skipping malformed entries.
pub fn extract_ranked_docs(text: &str) -> Vec<RankedDoc> {
    extract_json_array(text)
        .into_iter()
        .filter_map(|v| serde_json::from_value(v).ok())
        .collect()
}

/// Decode a list of strings, such as the planner's search queries.
///
/// Accepts a JSON array, a Python list literal, or either of those inside
/// a fenced code block or surrounding prose.
pub fn try_decode_string_list(text: &str) -> Option<Vec<String>> {
    let trimmed = text.trim();

    if let Some(list) = decode_lenient::<Vec<String>>(trimmed) {
        return Some(list);
    }

    if let Some(inner) = fenced_block_pattern()
        .and_then(|re| re.captures(trimmed))
        .and_then(|caps| caps.get(1))
    {
        if let Some(list) = decode_lenient::<Vec<String>>(inner.as_str().trim()) {
            return Some(list);
        }
    }

    let start = trimmed.find('[')?;
    let end = trimmed.rfind(']')?;
    if end <= start {
        return None;
    }
    decode_lenient::<Vec<String>>(&trimmed[start..=end])
}

/// [`try_decode_string_list`], falling back to the whole text as a single
/// element.
pub fn decode_string_list(text: &str) -> Vec<String> {
    match try_decode_string_list(text) {
        Some(list) => list,
        None => {
            warn!("Could not decode list literal, using raw text as a single item");
            vec![text.to_string()]
        }
    }
}

/// Try strict JSON first, then again after rewriting Python literal syntax.
fn decode_lenient<T: serde::de::DeserializeOwned>(text: &str) -> Option<T> {
    if let Ok(value) = serde_json::from_str(text) {
        return Some(value);
    }
    serde_json::from_str(&python_literal_to_json(text)).ok()
}

/// Rewrite a Python literal into JSON: single-quoted strings become
/// double-quoted, `True`/`False`/`None` become `true`/`false`/`null`, and
/// trailing commas before `]` or `}` are dropped.
fn python_literal_to_json(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '"' => {
                // Copy a double-quoted string verbatim.
                out.push('"');
                i += 1;
                while i < chars.len() {
                    out.push(chars[i]);
                    if chars[i] == '\\' && i + 1 < chars.len() {
                        out.push(chars[i + 1]);
                        i += 2;
                        continue;
                    }
                    i += 1;
                    if chars[i - 1] == '"' {
                        break;
                    }
                }
            }
            '\'' => {
                out.push('"');
                i += 1;
                while i < chars.len() && chars[i] != '\'' {
                    match chars[i] {
                        '\\' if i + 1 < chars.len() => {
                            if chars[i + 1] == '\'' {
                                out.push('\'');
                            } else {
                                out.push('\\');
                                out.push(chars[i + 1]);
                            }
                            i += 2;
                        }
                        '"' => {
                            out.push_str("\\\"");
                            i += 1;
                        }
                        other => {
                            out.push(other);
                            i += 1;
                        }
                    }
                }
                out.push('"');
                i += 1;
            }
            ',' => {
                let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
                if !matches!(next, Some(']') | Some('}')) {
                    out.push(',');
                }
                i += 1;
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                out.push_str(match word.as_str() {
                    "True" => "true",
                    "False" => "false",
                    "None" => "null",
                    other => other,
                });
            }
            other => {
                out.push(other);
                i += 1;
            }
        }
    }

    out
}
