//! Field extraction from streaming, possibly truncated JSON objects.
//!
//! Tool-call arguments arrive as a growing text buffer that is usually not
//! valid JSON yet, so `serde_json` cannot be used. These scanners pick out
//! string fields and summarize arrays without a full parse:
//!
//! - [`extract_field`] returns the raw (still escaped) value of a string
//!   field, including a partial value while its closing quote is missing.
//! - [`extract_array_summary`] summarizes an array of objects, but only once
//!   the whole array has arrived.

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Category used when suites disagree or carry no recognized type.
pub const MIXED_CATEGORY: &str = "mixed";

static CATEGORY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""testType"\s*:\s*"(unit|integration|e2e)""#).expect("valid category regex")
});

/// A string value located in the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FieldValue<'a> {
    raw: &'a str,
    complete: bool,
}

/// Extract the raw value of string field `field`.
///
/// Returns `None` until at least one value character has arrived after the
/// opening quote. A complete empty string (`"error": ""`) yields `Some("")`.
pub fn extract_field<'a>(buffer: &'a str, field: &str) -> Option<&'a str> {
    let value = scan_field(buffer, field)?;
    if !value.complete && value.raw.is_empty() {
        return None;
    }
    Some(value.raw)
}

/// Like [`extract_field`], but only once the closing quote has arrived.
pub fn extract_complete_field<'a>(buffer: &'a str, field: &str) -> Option<&'a str> {
    scan_field(buffer, field)
        .filter(|v| v.complete)
        .map(|v| v.raw)
}

fn scan_field<'a>(buffer: &'a str, field: &str) -> Option<FieldValue<'a>> {
    let key = format!("\"{field}\"");
    let start = find_value_start(buffer, &key, b'"')?;
    let bytes = buffer.as_bytes();

    let mut escaped = false;
    for (offset, &b) in bytes[start..].iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        match b {
            b'\\' => escaped = true,
            b'"' => {
                return Some(FieldValue {
                    raw: &buffer[start..start + offset],
                    complete: true,
                });
            }
            _ => {}
        }
    }

    // Truncated value: drop a dangling backslash so the prefix stays well formed.
    let mut raw = &buffer[start..];
    if escaped {
        raw = &raw[..raw.len() - 1];
    }
    Some(FieldValue {
        raw,
        complete: false,
    })
}

/// Find `key` followed by optional whitespace, `:`, optional whitespace and
/// the `open` byte. Returns the index just past `open`.
fn find_value_start(buffer: &str, key: &str, open: u8) -> Option<usize> {
    let bytes = buffer.as_bytes();
    let mut search_from = 0;

    while let Some(found) = buffer[search_from..].find(key) {
        let key_end = search_from + found + key.len();
        let mut i = skip_whitespace(bytes, key_end);
        if bytes.get(i) == Some(&b':') {
            i = skip_whitespace(bytes, i + 1);
            if bytes.get(i) == Some(&open) {
                return Some(i + 1);
            }
        }
        search_from = key_end;
    }
    None
}

fn skip_whitespace(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    i
}

/// Summary of a completely received array of objects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArraySummary {
    /// Number of complete object entries
    pub count: usize,
    /// `unit`, `integration`, `e2e`, or [`MIXED_CATEGORY`]
    pub dominant_category: String,
}

/// Summarize array field `field`.
///
/// Returns `None` while the array is still incomplete and when it holds no
/// complete object.
pub fn extract_array_summary(buffer: &str, field: &str) -> Option<ArraySummary> {
    let key = format!("\"{field}\"");
    let start = find_value_start(buffer, &key, b'[')?;
    let bytes = buffer.as_bytes();

    let mut depth = 1usize;
    let mut in_string = false;
    let mut escaped = false;
    let mut count = 0usize;
    let mut end = None;

    for (offset, &b) in bytes[start..].iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'[' | b'{' => depth += 1,
            b']' | b'}' => {
                depth -= 1;
                if b == b'}' && depth == 1 {
                    count += 1;
                }
                if depth == 0 {
                    end = Some(start + offset);
                    break;
                }
            }
            _ => {}
        }
    }

    let span = &buffer[start..end?];
    if count == 0 {
        return None;
    }

    Some(ArraySummary {
        count,
        dominant_category: dominant_category(span, count),
    })
}

fn dominant_category(span: &str, entries: usize) -> String {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for captures in CATEGORY_PATTERN.captures_iter(span) {
        if let Some(value) = captures.get(1) {
            *counts.entry(value.as_str()).or_default() += 1;
        }
    }

    if counts.len() == 1 {
        return counts.keys().next().map(|c| c.to_string()).unwrap_or_default();
    }

    match counts.iter().max_by_key(|(_, n)| **n) {
        Some((category, n)) if *n == entries => category.to_string(),
        _ => MIXED_CATEGORY.to_string(),
    }
}
