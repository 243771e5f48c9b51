// In crates/risk/src/reasoning.rs

//! Parsers for the structured tokens a model embeds in free-text reasoning.

use crate::error::Violation;
use core_types::Grade;
use once_cell::sync::Lazy;
use regex::Regex;

/// `grade: A`, `Grade=S`, `grade：B`. The grade letter must not run into a word.
static GRADE_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bgrade\s*[:：=]?\s*([SABCDF])(?:[^A-Za-z]|$)").expect("Invalid grade regex")
});

static SCORE_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bscore\s*[:：=]?\s*(\d{1,3})\b").expect("Invalid score regex")
});

/// Compact forms such as `A/82` or `B(70)`.
static COMPACT_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b([SABCDF])\s*(?:/\s*|\(\s*)(\d{1,3})\b").expect("Invalid compact grade regex")
});

static PARTIAL_TRIGGER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(trigger(?:ed)?|because|reason|hit|reached|tp[123]|target|resistance|support|rejection|divergence)\b")
        .expect("Invalid trigger regex")
});

static PARTIAL_FRACTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d{1,3}(?:\.\d+)?\s*%|\b(?:half|third|quarter|ratio|fraction)\b|\b0?\.\d+\b)")
        .expect("Invalid fraction regex")
});

static PARTIAL_REMAINDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(remain(?:der|ing)?|rest|runner|let .{0,20}run|trail(?:ing)?)\b")
        .expect("Invalid remainder regex")
});

/// Finds the grade and score in `reasoning` and checks they agree.
///
/// Labelled tokens (`grade: A`, `score: 80`) take precedence over the compact
/// `A/80` form; the first occurrence of each wins.
pub fn parse_grade(reasoning: &str) -> Result<(Grade, u32), Violation> {
    let compact = COMPACT_TOKEN.captures(reasoning);

    let grade_text = GRADE_TOKEN
        .captures(reasoning)
        .and_then(|c| c.get(1))
        .or_else(|| compact.as_ref().and_then(|c| c.get(1)))
        .map(|m| m.as_str().to_string())
        .ok_or(Violation::GradeMissing)?;
    let grade: Grade = grade_text.parse().map_err(|_| Violation::GradeMissing)?;

    let score = SCORE_TOKEN
        .captures(reasoning)
        .and_then(|c| c.get(1))
        .or_else(|| compact.as_ref().and_then(|c| c.get(2)))
        .and_then(|m| m.as_str().parse::<u32>().ok())
        .ok_or(Violation::ScoreMissing)?;

    let range = grade.score_range();
    if !range.contains(&score) {
        return Err(Violation::GradeScoreMismatch {
            grade,
            score,
            min: *range.start(),
            max: *range.end(),
        });
    }
    Ok((grade, score))
}

/// A partial close must explain why, how much, and what happens to the rest.
pub fn check_partial_close_rationale(reasoning: &str) -> Result<(), Violation> {
    if !PARTIAL_TRIGGER.is_match(reasoning) {
        return Err(Violation::PartialCloseRationale("trigger"));
    }
    if !PARTIAL_FRACTION.is_match(reasoning) {
        return Err(Violation::PartialCloseRationale("fraction closed"));
    }
    if !PARTIAL_REMAINDER.is_match(reasoning) {
        return Err(Violation::PartialCloseRationale("plan for the remainder"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labelled_tokens() {
        assert_eq!(parse_grade("Trend intact. Grade: A, score: 80").unwrap(), (Grade::A, 80));
        assert_eq!(parse_grade("grade=s score=92").unwrap(), (Grade::S, 92));
        assert_eq!(parse_grade("GRADE：B SCORE：70").unwrap(), (Grade::B, 70));
    }

    #[test]
    fn test_compact_token() {
        assert_eq!(parse_grade("Setup A/82 on the 4h").unwrap(), (Grade::A, 82));
        assert_eq!(parse_grade("rated B(66)").unwrap(), (Grade::B, 66));
    }

    #[test]
    fn test_grade_word_is_not_a_letter() {
        // "grade score" must not read the `s` of "score" as grade S.
        assert_eq!(parse_grade("grade score: 80"), Err(Violation::GradeMissing));
    }

    #[test]
    fn test_missing_and_inconsistent_tokens() {
        assert_eq!(parse_grade("looks good, score 90"), Err(Violation::GradeMissing));
        assert_eq!(parse_grade("grade: A"), Err(Violation::ScoreMissing));
        assert_eq!(
            parse_grade("grade: A score: 90"),
            Err(Violation::GradeScoreMismatch { grade: Grade::A, score: 90, min: 75, max: 84 })
        );
        assert!(matches!(
            parse_grade("grade: S score: 150"),
            Err(Violation::GradeScoreMismatch { .. })
        ));
    }

    #[test]
    fn test_partial_close_rationale() {
        assert!(
            check_partial_close_rationale(
                "TP1 reached, closing 50% and trailing the remainder to breakeven"
            )
            .is_ok()
        );
        assert_eq!(
            check_partial_close_rationale("closing 50%, keep the rest"),
            Err(Violation::PartialCloseRationale("trigger"))
        );
        assert_eq!(
            check_partial_close_rationale("target hit, trim some and let the runner go"),
            Err(Violation::PartialCloseRationale("fraction closed"))
        );
        assert_eq!(
            check_partial_close_rationale("resistance hit, close half"),
            Err(Violation::PartialCloseRationale("plan for the remainder"))
        );
    }
}
