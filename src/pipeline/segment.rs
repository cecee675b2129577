//! Splits recognized text into per-question blocks at question markers
//! (`Q12`, `問12`, `付問3-1`, `Ｑ５：`).

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use super::types::QuestionId;

/// Optional sub-question prefix, question glyph, id, optional closing mark.
static MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"付?(?:Q|Ｑ|問)\s*([0-9０-９]+(?:[-－‐][0-9０-９]+)?)[.．:：)）]?")
        .expect("valid regex")
});

/// Bare leading number in a label, e.g. `12. 年齢` or `3-1) 理由`.
static LEADING_NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([0-9０-９]+(?:[-－‐][0-9０-９]+)?)[.．:：)）\s]").expect("valid regex")
});

/// A question marker found in text, with byte offsets of the whole marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    pub id: QuestionId,
    pub start: usize,
    pub end: usize,
}

/// True when the byte at `pos` directly follows a Latin letter, as the `Q`
/// in `FAQ1` or `IQ 120` does.
pub(crate) fn follows_letter(text: &str, pos: usize) -> bool {
    text[..pos]
        .chars()
        .next_back()
        .is_some_and(|c| c.is_ascii_alphabetic())
}

fn standalone_markers(text: &str) -> impl Iterator<Item = regex::Captures<'_>> {
    MARKER_RE
        .captures_iter(text)
        .filter(move |caps| caps.get(0).is_some_and(|m| !follows_letter(text, m.start())))
}

/// All non-overlapping question markers, in text order.
pub fn find_markers(text: &str) -> Vec<Marker> {
    standalone_markers(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let id = QuestionId::from_token(caps.get(1)?.as_str())?;
            Some(Marker {
                id,
                start: whole.start(),
                end: whole.end(),
            })
        })
        .collect()
}

/// Map each question id to the text between its marker and the next one.
///
/// A repeated id keeps the block of its last occurrence. Text before the
/// first marker belongs to no block. No markers yields an empty map.
pub fn segment(text: &str) -> HashMap<QuestionId, &str> {
    let markers = find_markers(text);
    let mut blocks = HashMap::with_capacity(markers.len());

    for (i, marker) in markers.iter().enumerate() {
        let block_end = markers.get(i + 1).map_or(text.len(), |next| next.start);
        blocks.insert(marker.id.clone(), &text[marker.end..block_end]);
    }

    blocks
}

/// Question id embedded in a schema label, if it has a recognizable one.
pub fn parse_question_id(label: &str) -> Option<QuestionId> {
    if let Some(caps) = standalone_markers(label).next() {
        if let Some(id) = caps.get(1).and_then(|m| QuestionId::from_token(m.as_str())) {
            return Some(id);
        }
    }
    LEADING_NUMBER_RE
        .captures(label)
        .and_then(|caps| caps.get(1))
        .and_then(|m| QuestionId::from_token(m.as_str()))
}

/// Byte range of the marker inside `label`, used to keep it out of keywords.
pub(crate) fn marker_range(label: &str) -> Option<std::ops::Range<usize>> {
    standalone_markers(label)
        .next()
        .and_then(|caps| caps.get(0))
        .or_else(|| LEADING_NUMBER_RE.find(label))
        .map(|m| m.range())
}
