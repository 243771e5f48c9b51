// In crates/decision/src/repair.rs

//! Best-effort repair of almost-JSON written by a language model.
//!
//! Applied once, and only after a payload failed to decode. The rules, in
//! order:
//!
//! 1. Typographic quotes (“ ” „ ‟ ‘ ’ ‚ ‛) become ASCII quotes.
//! 2. Zero-width characters and byte-order marks are removed.
//! 3. A bare value after `"field":` is wrapped in quotes, with embedded
//!    quotes, backslashes, newlines and tabs escaped. Values that are already
//!    quoted, numeric, `true`/`false`/`null`, or nested objects/arrays are
//!    left alone.

use once_cell::sync::Lazy;
use regex::Regex;

/// `"field":` followed by optional whitespace.
static FIELD_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""[A-Za-z_][A-Za-z0-9_]*"[ \t]*:[ \t]*"#).expect("Invalid field key regex")
});

/// Start of the next `"field":` on the same line.
static NEXT_FIELD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#",[ \t]*"[A-Za-z_][A-Za-z0-9_]*"[ \t]*:"#).expect("Invalid next field regex")
});

const INVISIBLE: [char; 5] = ['\u{200B}', '\u{200C}', '\u{200D}', '\u{2060}', '\u{FEFF}'];

/// Runs every repair rule over `text`.
pub fn repair(text: &str) -> String {
    quote_bare_values(&strip_invisible(&canonicalize_quotes(text)))
}

pub fn canonicalize_quotes(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' | '\u{2033}' => '"',
            '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' | '\u{2032}' => '\'',
            other => other,
        })
        .collect()
}

pub fn strip_invisible(text: &str) -> String {
    text.chars().filter(|c| !INVISIBLE.contains(c)).collect()
}

/// Wraps unquoted string values in quotes.
pub fn quote_bare_values(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    let mut copied_to = 0;

    for key in FIELD_KEY.find_iter(text) {
        if key.start() < copied_to {
            continue;
        }
        let value_start = key.end();
        let rest = &text[value_start..];
        if !is_bare(rest) {
            continue;
        }
        let value_len = bare_value_len(rest);
        let value = rest[..value_len].trim_end();
        if value.is_empty() {
            continue;
        }

        out.push_str(&text[copied_to..value_start]);
        out.push('"');
        out.push_str(&escape(value));
        out.push('"');
        copied_to = value_start + value.len();
    }

    out.push_str(&text[copied_to..]);
    out
}

fn is_bare(rest: &str) -> bool {
    let Some(first) = rest.chars().next() else {
        return false;
    };
    if matches!(first, '"' | '\'' | '{' | '[' | '-' | '+' | '.' | ',' | '}' | ']')
        || first.is_ascii_digit()
        || first.is_whitespace()
    {
        return false;
    }
    !["true", "false", "null"].iter().any(|literal| {
        rest.strip_prefix(literal)
            .is_some_and(|after| !after.starts_with(|c: char| c.is_alphanumeric() || c == '_'))
    })
}

/// Length of a bare value: up to the end of the line, the next `, "field":`,
/// or a closing `}`/`]` after which the line holds only closers and commas.
fn bare_value_len(rest: &str) -> usize {
    let line_end = rest.find(['\n', '\r']).unwrap_or(rest.len());
    let line = &rest[..line_end];

    let mut end = line.len();
    if let Some(next) = NEXT_FIELD.find(line) {
        end = next.start();
    }
    for (idx, c) in line[..end].char_indices() {
        if (c == '}' || c == ']')
            && line[idx..]
                .chars()
                .all(|t| matches!(t, '}' | ']' | ',') || t.is_whitespace())
        {
            end = idx;
            break;
        }
    }
    let trimmed = line[..end].trim_end();
    trimmed.strip_suffix(',').unwrap_or(trimmed).len()
}

fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            other => escaped.push(other),
        }
    }
    escaped
}
