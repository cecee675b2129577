//! Normalization of recognized text before it is shown to the model.
//!
//! Every step is idempotent on its own output, and no step produces input
//! that an earlier step would rewrite, so `sanitize` as a whole is too.

use std::sync::LazyLock;

use regex::Regex;

use super::segment::follows_letter;

/// First "question 1" marker; everything before it is survey preamble.
static FIRST_QUESTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"付?(?:Q|問)\s*0*1(?:\D|$)").expect("valid regex"));

/// Runs of horizontal whitespace (anything but line breaks).
static HORIZONTAL_WS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\S\n]+").expect("valid regex"));

static ENGLISH_SEX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bsex\b").expect("valid regex"));

/// Terms that trip content-safety filters on ordinary demographic questions.
/// Replacements keep the slot recognizable and never contain a key.
const SAFETY_SUBSTITUTIONS: &[(&str, &str)] = &[
    ("性別", "男女区分"),
    ("妊娠", "マタニティ"),
    ("自殺", "自損"),
];

/// Normalize recognized text for extraction.
///
/// 1. Line endings to `\n`, control characters dropped
/// 2. Full-width ASCII forms and the ideographic space to half-width
/// 3. Safety substitutions
/// 4. Horizontal whitespace runs collapsed to one space
/// 5. Preamble before the first question-1 marker removed
pub fn sanitize(text: &str) -> String {
    let normalized = normalize_terms(text);
    let first_question = FIRST_QUESTION_RE
        .find_iter(&normalized)
        .find(|m| !follows_letter(&normalized, m.start()));

    match first_question {
        Some(m) if m.start() > 0 => normalized[m.start()..].to_string(),
        _ => normalized,
    }
}

/// Steps 1 to 4 of [`sanitize`], without the preamble trim.
///
/// Schema labels go through this too, so keyword lookups and the question
/// list in prompts use the same vocabulary as the sanitized text.
pub fn normalize_terms(text: &str) -> String {
    let normalized: String = text
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .map(to_half_width)
        .collect();

    let mut substituted = normalized;
    for (term, replacement) in SAFETY_SUBSTITUTIONS {
        if substituted.contains(term) {
            substituted = substituted.replace(term, replacement);
        }
    }
    let substituted = ENGLISH_SEX_RE.replace_all(&substituted, "gender");

    HORIZONTAL_WS_RE.replace_all(&substituted, " ").into_owned()
}

fn to_half_width(c: char) -> char {
    match c {
        '\u{3000}' => ' ',
        '\u{FF01}'..='\u{FF5E}' => char::from_u32(c as u32 - 0xFEE0).unwrap_or(c),
        _ => c,
    }
}
