// In crates/decision/src/extract.rs

use crate::repair;
use crate::{Error, Result};
use core_types::Decision;
use once_cell::sync::Lazy;
use regex::Regex;

/// Maximum number of raw characters carried in an extraction error.
const RAW_EXCERPT_CHARS: usize = 512;

/// A fenced block with an optional language tag: ```json ... ```
static FENCED_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```[A-Za-z0-9_-]*[ \t]*\r?\n?(.*?)```").expect("Invalid fenced block regex")
});

/// A lone fence marker, e.g. from an output that was cut off before the closing fence.
static FENCE_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```[A-Za-z0-9_-]*").expect("Invalid fence marker regex"));

/// The result of a successful extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    /// Free-form text the model wrote before the decision array.
    pub reasoning: String,
    /// Decisions in the order the model listed them.
    pub decisions: Vec<Decision>,
}

/// Splits raw model output into its reasoning trace and decision list.
///
/// The payload is located by bracket scanning rather than by any delimiter
/// the model was asked to use. If decoding fails, the text goes through one
/// repair pass (see [`repair::repair`]) before the extraction is abandoned.
pub fn extract(raw: &str) -> Result<Extraction> {
    let (lead, region) = strip_fences(raw);

    let first_error = match decode_region(&region) {
        Ok((start, decisions)) => {
            return Ok(Extraction {
                reasoning: join_reasoning(&lead, &region[..start]),
                decisions,
            });
        }
        Err(reason) => reason,
    };

    tracing::debug!(reason = %first_error, "Decision payload did not decode, attempting repair.");
    let repaired = repair::repair(&region);

    match decode_region(&repaired) {
        Ok((start, decisions)) => {
            tracing::warn!(
                count = decisions.len(),
                original_error = %first_error,
                "Decision payload decoded only after repair."
            );
            Ok(Extraction {
                reasoning: join_reasoning(&lead, &repaired[..start]),
                decisions,
            })
        }
        Err(reason) => {
            let reasoning = locate_array_start(&region)
                .map(|start| join_reasoning(&lead, &region[..start]))
                .unwrap_or_else(|| join_reasoning(&lead, &region));
            Err(Error::ExtractionFailed {
                reason: format!("{first_error}; after repair: {reason}"),
                reasoning,
                raw_excerpt: raw.chars().take(RAW_EXCERPT_CHARS).collect(),
            })
        }
    }
}

/// Removes code fences around the payload.
///
/// Returns the text before the fence (part of the reasoning) and the region
/// to scan for the decision array.
fn strip_fences(raw: &str) -> (String, String) {
    for caps in FENCED_BLOCK.captures_iter(raw) {
        let (Some(whole), Some(body)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if body.as_str().contains('[') {
            return (raw[..whole.start()].to_string(), body.as_str().to_string());
        }
    }
    (String::new(), FENCE_MARKER.replace_all(raw, "").into_owned())
}

fn join_reasoning(lead: &str, before_payload: &str) -> String {
    let lead = lead.trim();
    let rest = before_payload.trim();
    match (lead.is_empty(), rest.is_empty()) {
        (true, _) => rest.to_string(),
        (false, true) => lead.to_string(),
        (false, false) => format!("{lead}\n{rest}"),
    }
}

/// Finds, bounds and decodes the decision array in `region`.
///
/// Returns the byte offset where the array starts together with the decoded
/// decisions, or a human-readable reason for failure.
fn decode_region(region: &str) -> std::result::Result<(usize, Vec<Decision>), String> {
    let candidates = array_start_candidates(region);
    if candidates.is_empty() {
        return Err("no JSON array found in model output".to_string());
    }

    let mut last_error = String::new();
    for start in candidates {
        let end = match matching_bracket(region, start) {
            Ok(end) => end,
            Err(e) => {
                last_error = e;
                continue;
            }
        };
        match serde_json::from_str::<Vec<Decision>>(&region[start..=end]) {
            Ok(decisions) => return Ok((start, decisions)),
            Err(e) => last_error = format!("invalid decision JSON at offset {start}: {e}"),
        }
    }
    Err(last_error)
}

/// The preferred array start, as used by [`extract`].
pub fn locate_array_start(region: &str) -> Option<usize> {
    array_start_candidates(region).into_iter().next()
}

/// Orders the plausible array openings in `region`.
///
/// The first `[` wins when it is followed by `{`, `]` or whitespace. When it
/// looks like a markdown list marker instead ("[x]", "[✓]", "[-]"), the scan
/// moves to the `[` that closes at the last `]` of the text. The remaining
/// candidates are fallbacks for reasoning that contains bracketed numbers.
fn array_start_candidates(region: &str) -> Vec<usize> {
    let mut candidates = Vec::new();
    let Some(first) = region.find('[') else {
        return candidates;
    };
    if opens_payload(region, first) {
        candidates.push(first);
    }

    if let Some(last_close) = region.rfind(']') {
        for (idx, _) in region[..last_close].rmatch_indices('[') {
            if opens_payload(region, idx)
                && matching_bracket(region, idx).ok() == Some(last_close)
                && !candidates.contains(&idx)
            {
                candidates.push(idx);
                break;
            }
        }
    }

    for (idx, _) in region.match_indices('[') {
        if opens_payload(region, idx) && !candidates.contains(&idx) {
            candidates.push(idx);
        }
    }
    candidates
}

fn opens_payload(text: &str, bracket: usize) -> bool {
    match text[bracket + 1..].chars().next() {
        Some(c) => c == '{' || c == ']' || c.is_whitespace(),
        None => false,
    }
}

/// Returns the byte offset of the `]` closing the `[` at `start`.
///
/// String-aware: a `"` or `'` opens a string that only the same quote closes,
/// a backslash inside a string escapes the next character, and brackets
/// inside strings do not count.
pub fn matching_bracket(text: &str, start: usize) -> std::result::Result<usize, String> {
    let mut depth: usize = 0;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if let Some(open) = quote {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == open {
                quote = None;
            }
            continue;
        }

        match ch {
            '"' | '\'' => quote = Some(ch),
            '[' => depth += 1,
            ']' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Ok(start + offset);
                }
            }
            _ => {}
        }
    }

    Err(format!(
        "unbalanced brackets: array opened at offset {start} never closes (depth {depth} at end of text)"
    ))
}
