//! Small helpers shared by the forum extractors.

use chrono::{DateTime, NaiveDateTime, Utc};
use scraper::ElementRef;

/// Maximum length of a markup fragment included in a log line.
const FRAGMENT_LOG_CHARS: usize = 240;

/// Concatenated text of an element with surrounding whitespace removed.
#[must_use]
pub fn element_text(element: &ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Whether the element's class attribute contains every token in `required`.
///
/// Token order, duplicates and extra whitespace between tokens are ignored.
#[must_use]
pub fn has_class_tokens(element: &ElementRef<'_>, required: &[&str]) -> bool {
    let classes: Vec<&str> = element.value().classes().collect();
    required.iter().all(|token| classes.contains(token))
}

/// Parse a rendered count such as `1,234` or ` 17 `.
#[must_use]
pub fn parse_count(text: &str) -> Option<u64> {
    let digits: String = text
        .trim()
        .chars()
        .filter(|c| !matches!(c, ',' | '.' | ' ' | '\u{a0}'))
        .collect();
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// The last number appearing in `text`, ignoring thousands separators.
#[must_use]
pub fn last_number(text: &str) -> Option<u64> {
    let mut last = None;
    let mut current = String::new();

    for c in text.chars().chain(std::iter::once(' ')) {
        if c.is_ascii_digit() {
            current.push(c);
        } else if c == ',' && !current.is_empty() {
            // Thousands separator inside a number
        } else if !current.is_empty() {
            last = current.parse().ok().or(last);
            current.clear();
        }
    }

    last
}

/// Parse a `datetime` attribute.
///
/// The forum renders RFC 3339 values; bare `YYYY-MM-DD HH:MM:SS` values are
/// taken as UTC.
#[must_use]
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Leading part of an element's markup, for log lines.
#[must_use]
pub fn fragment(element: &ElementRef<'_>) -> String {
    let html = element.html();
    if html.chars().count() <= FRAGMENT_LOG_CHARS {
        html
    } else {
        let truncated: String = html.chars().take(FRAGMENT_LOG_CHARS).collect();
        format!("{truncated}...")
    }
}
