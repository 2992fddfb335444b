//! Pure header/body extraction over raw message text.
//!
//! Deterministic and total: arbitrary input — malformed headers, binary-ish
//! payloads — degrades to best-effort strings, never an error.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::{Regex, RegexBuilder};

static BLANK_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\r?\n\r?\n").expect("literal pattern"));

/// First value of a `Name: value` header line.
///
/// The match is case-insensitive and anchored per line; the first hit wins.
/// Returns `None` when no such header line exists.
pub fn extract_header(raw: &str, name: &str) -> Option<String> {
    let pattern = format!(r"^{}:[ \t]*(.+)$", regex::escape(name));
    let re = RegexBuilder::new(&pattern)
        .case_insensitive(true)
        .multi_line(true)
        .build()
        .ok()?;
    re.captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
}

/// Everything after the first blank line separating headers from body,
/// trimmed. When no blank-line boundary exists, the whole trimmed input
/// is treated as body.
pub fn extract_body(raw: &str) -> String {
    match BLANK_LINE.find(raw) {
        Some(boundary) => raw[boundary.end()..].trim().to_string(),
        None => raw.trim().to_string(),
    }
}

/// Parse a Date header value. RFC 2822 first, RFC 3339 as a lenient
/// fallback for servers that emit it.
pub fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    DateTime::parse_from_rfc2822(value)
        .or_else(|_| DateTime::parse_from_rfc3339(value))
        .map(|d| d.with_timezone(&Utc))
        .ok()
}

/// Strip HTML tags from content (basic) and normalize whitespace.
pub fn strip_html(html: &str) -> String {
    let mut result = String::new();
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => result.push(ch),
            _ => {}
        }
    }
    result.split_whitespace().collect::<Vec<_>>().join(" ")
}
