//! Admission checks and text defenses for logbook entries.
//!
//! Two separate defenses live here and both are applied:
//!
//! - [`sanitize`] runs before storage. It strips control characters and
//!   script-like URL schemes from free text.
//! - [`escape_for_display`] runs at render time. It neutralizes markup when
//!   untrusted text is placed into HTML.
//!
//! Every boundary (HTTP JSON, HTML form, CLI) goes through the same
//! [`validate`] and [`sanitize`], so the rules cannot drift apart.

use crate::constants::{
    LATITUDE_RANGE, LONGITUDE_RANGE, MAX_BODY_LENGTH, MAX_TITLE_LENGTH, STRIPPED_SCHEMES,
};
use crate::entry::EntryCandidate;
use chrono::{DateTime, Utc};
use serde_json::Value;

/// A coordinate that was supplied but is not a finite number inside its range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidCoordinate;

/// Checks a candidate against every field constraint.
///
/// All checks run; the returned list holds one message per violated
/// constraint, in field order. An empty list means the candidate is admissible.
///
/// # Examples
///
/// ```
/// use logbook::entry::EntryCandidate;
/// use logbook::validation::validate;
///
/// let ok = EntryCandidate::new("Patrol", "All quiet.", Some(40.0), Some(-74.0));
/// assert!(validate(&ok).is_empty());
///
/// let bad = EntryCandidate::new("", "x", Some(91.0), None);
/// let errors = validate(&bad);
/// assert_eq!(errors.len(), 2);
/// assert!(errors[0].contains("Title is required"));
/// assert!(errors[1].contains("Latitude"));
/// ```
pub fn validate(candidate: &EntryCandidate) -> Vec<String> {
    let mut errors = Vec::new();

    if let Some(message) = check_text("Title", candidate.title.as_ref(), MAX_TITLE_LENGTH) {
        errors.push(message);
    }
    if let Some(message) = check_text("Body", candidate.body.as_ref(), MAX_BODY_LENGTH) {
        errors.push(message);
    }
    if parse_coordinate(candidate.lat.as_ref(), LATITUDE_RANGE).is_err() {
        errors.push(format!(
            "Latitude must be a valid number between {} and {}",
            LATITUDE_RANGE.0, LATITUDE_RANGE.1
        ));
    }
    if parse_coordinate(candidate.lon.as_ref(), LONGITUDE_RANGE).is_err() {
        errors.push(format!(
            "Longitude must be a valid number between {} and {}",
            LONGITUDE_RANGE.0, LONGITUDE_RANGE.1
        ));
    }

    errors
}

fn check_text(field: &str, value: Option<&Value>, max_chars: usize) -> Option<String> {
    let text = match value {
        Some(Value::String(text)) if !text.is_empty() => text,
        _ => return Some(format!("{} is required and must be a string", field)),
    };

    // Limits apply to what would be stored.
    let cleaned = sanitize(text);
    if cleaned.chars().count() > max_chars {
        return Some(format!(
            "{} must be {} characters or fewer",
            field, max_chars
        ));
    }

    if cleaned.is_empty() {
        return Some(format!("{} cannot be empty after sanitization", field));
    }

    None
}

/// Interprets an optional coordinate.
///
/// `None`, JSON `null`, and blank strings are "not supplied" and yield
/// `Ok(None)`. Numbers and numeric strings must be finite and inside `range`
/// (inclusive). Anything else is an [`InvalidCoordinate`].
///
/// # Examples
///
/// ```
/// use logbook::validation::parse_coordinate;
/// use serde_json::json;
///
/// let range = (-90.0, 90.0);
/// assert_eq!(parse_coordinate(None, range), Ok(None));
/// assert_eq!(parse_coordinate(Some(&json!("")), range), Ok(None));
/// assert_eq!(parse_coordinate(Some(&json!("45.5")), range), Ok(Some(45.5)));
/// assert!(parse_coordinate(Some(&json!(120)), range).is_err());
/// assert!(parse_coordinate(Some(&json!("north")), range).is_err());
/// ```
pub fn parse_coordinate(
    value: Option<&Value>,
    range: (f64, f64),
) -> Result<Option<f64>, InvalidCoordinate> {
    let number = match value {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(text)) if text.trim().is_empty() => return Ok(None),
        Some(Value::String(text)) => text.trim().parse::<f64>().map_err(|_| InvalidCoordinate)?,
        Some(Value::Number(number)) => number.as_f64().ok_or(InvalidCoordinate)?,
        Some(_) => return Err(InvalidCoordinate),
    };

    if !number.is_finite() || number < range.0 || number > range.1 {
        return Err(InvalidCoordinate);
    }

    Ok(Some(number))
}

/// Parses a stored `isoTime` value. Only RFC 3339 timestamps are accepted.
pub fn parse_iso_time(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text.trim())
        .ok()
        .map(|time| time.with_timezone(&Utc))
}

/// Removes control characters and script-like URL schemes, then trims.
///
/// Stripped: ASCII control characters 0x00–0x08, 0x0B, 0x0C, 0x0E–0x1F and
/// 0x7F (tab, newline and carriage return survive), and every case-insensitive
/// occurrence of `javascript:`, `data:` and `vbscript:`. Scheme removal repeats
/// until none remain, so `javajavascript:script:` cannot reassemble into a
/// live scheme. The function is idempotent.
///
/// # Examples
///
/// ```
/// use logbook::validation::sanitize;
///
/// assert_eq!(sanitize("  hello\u{0007} world  "), "hello world");
/// assert_eq!(sanitize("click JavaScript:alert(1)"), "click alert(1)");
/// assert_eq!(sanitize("javajavascript:script:x"), "x");
/// assert_eq!(sanitize(&sanitize(" data:\u{0001}x ")), sanitize(" data:\u{0001}x "));
/// ```
pub fn sanitize(text: &str) -> String {
    let mut cleaned: String = text.chars().filter(|c| !is_stripped_control(*c)).collect();

    while let Some((start, len)) = find_stripped_scheme(&cleaned) {
        cleaned.replace_range(start..start + len, "");
    }

    cleaned.trim().to_string()
}

/// Sanitizes an untyped value; anything other than a string becomes `""`.
pub fn sanitize_value(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(text)) => sanitize(text),
        _ => String::new(),
    }
}

fn is_stripped_control(c: char) -> bool {
    matches!(c, '\u{00}'..='\u{08}' | '\u{0B}' | '\u{0C}' | '\u{0E}'..='\u{1F}' | '\u{7F}')
}

// Schemes are ASCII, so byte offsets in the lowercased copy match the original.
fn find_stripped_scheme(text: &str) -> Option<(usize, usize)> {
    let lowered = text.to_ascii_lowercase();
    STRIPPED_SCHEMES
        .iter()
        .filter_map(|scheme| lowered.find(scheme).map(|start| (start, scheme.len())))
        .min_by_key(|(start, _)| *start)
}

/// Escapes text for insertion into HTML element or attribute content.
///
/// # Examples
///
/// ```
/// use logbook::validation::escape_for_display;
///
/// assert_eq!(
///     escape_for_display(r#"<a href="/x">'hi' & bye</a>"#),
///     "&lt;a href=&quot;&#x2F;x&quot;&gt;&#039;hi&#039; &amp; bye&lt;&#x2F;a&gt;"
/// );
/// assert_eq!(escape_for_display(""), "");
/// ```
pub fn escape_for_display(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#039;"),
            '/' => escaped.push_str("&#x2F;"),
            other => escaped.push(other),
        }
    }
    escaped
}
