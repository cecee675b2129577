//! Per-question context selection.
//!
//! Each schema entry gets the slice of recognized text most likely to hold
//! its answer, so prompts carry a few kilobytes instead of the whole scan.

use std::sync::LazyLock;

use regex::Regex;

use super::segment::{marker_range, parse_question_id, segment};
use super::types::{ContextEntry, ContextKey, ContextSource, ExtractionContext};

/// Upper bound on any snippet, in characters.
pub const CONTEXT_CAP_CHARS: usize = 2_000;
/// Characters kept before a keyword hit.
const WINDOW_BEFORE: usize = 300;
/// Characters kept from a keyword hit onwards.
const WINDOW_AFTER: usize = 1_200;
/// Head of the document used when nothing else matches.
const HEAD_CHARS: usize = 1_200;
const MAX_KEYWORDS: usize = 3;

static KEYWORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[0-9A-Za-z\p{Han}\p{Hiragana}\p{Katakana}ー々]{2,}").expect("valid regex")
});

/// Build one context entry per schema label, in schema order.
pub fn build_context(text: &str, schema: &[String]) -> ExtractionContext {
    let blocks = segment(text);
    let mut entries = Vec::with_capacity(schema.len());

    for (idx, label) in schema.iter().enumerate() {
        let id = parse_question_id(label);

        let own_block = id.as_ref().and_then(|id| blocks.get(id));
        let parent_block = id
            .as_ref()
            .and_then(|id| id.parent())
            .and_then(|parent| blocks.get(&parent));

        let (snippet, source) = if let Some(block) = own_block {
            (*block, ContextSource::Block)
        } else if let Some(block) = parent_block {
            (*block, ContextSource::ParentBlock)
        } else {
            keyword_window(text, label)
        };

        let key = match id {
            Some(id) => ContextKey::Question(id),
            None => ContextKey::Position(idx),
        };

        entries.push(ContextEntry {
            key,
            label: label.clone(),
            snippet: truncate_chars(snippet, CONTEXT_CAP_CHARS).to_string(),
            source,
        });
    }

    ExtractionContext { entries }
}

/// Up to three keywords of length two or more, with the marker left out.
pub fn label_keywords(label: &str) -> Vec<&str> {
    let (head, tail) = match marker_range(label) {
        Some(range) => (&label[..range.start], &label[range.end..]),
        None => (label, ""),
    };
    KEYWORD_RE
        .find_iter(head)
        .chain(KEYWORD_RE.find_iter(tail))
        .map(|m| m.as_str())
        .take(MAX_KEYWORDS)
        .collect()
}

fn keyword_window<'a>(text: &'a str, label: &str) -> (&'a str, ContextSource) {
    for keyword in label_keywords(label) {
        if let Some(pos) = text.find(keyword) {
            return (char_window(text, pos, WINDOW_BEFORE, WINDOW_AFTER), ContextSource::Keyword);
        }
    }
    (truncate_chars(text, HEAD_CHARS), ContextSource::Head)
}

/// `before` characters ahead of byte offset `pos` through `after` characters from it.
fn char_window(text: &str, pos: usize, before: usize, after: usize) -> &str {
    let start = text[..pos]
        .char_indices()
        .rev()
        .take(before)
        .last()
        .map_or(pos, |(i, _)| i);
    let end = text[pos..]
        .char_indices()
        .nth(after)
        .map_or(text.len(), |(i, _)| pos + i);
    &text[start..end]
}

pub(crate) fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn uses_segmented_block() {
        let text = "Q1 Name: Alice\nQ2 Age: 5\n";
        let ctx = build_context(text, &labels(&["Q1 Name", "Q2 Age"]));
        assert_eq!(ctx.len(), 2);
        assert_eq!(ctx.entries[0].snippet, " Name: Alice\n");
        assert_eq!(ctx.entries[0].source, ContextSource::Block);
        assert_eq!(ctx.entries[1].key.to_string(), "Q2");
    }

    #[test]
    fn sub_question_falls_back_to_parent_block() {
        let text = "問39 よく使う はい 理由: 便利だから\n問40 その他";
        let ctx = build_context(text, &labels(&["付問39-1 その理由"]));
        assert_eq!(ctx.entries[0].source, ContextSource::ParentBlock);
        assert!(ctx.entries[0].snippet.contains("便利だから"));
    }

    #[test]
    fn missing_id_uses_keyword_window() {
        let filler = "x".repeat(500);
        let text = format!("{filler}好きな色は青です{filler}");
        let ctx = build_context(&text, &labels(&["好きな色"]));
        let entry = &ctx.entries[0];
        assert_eq!(entry.source, ContextSource::Keyword);
        assert_eq!(entry.key, ContextKey::Position(0));
        assert!(entry.snippet.contains("好きな色は青です"));
        // 300 chars of lead-in, then the 8-char hit and 500 trailing chars
        assert_eq!(entry.snippet.chars().count(), 808);
    }

    #[test]
    fn unknown_id_uses_keyword_window() {
        let text = "Q1 Name: Alice\nAge: 5";
        let ctx = build_context(text, &labels(&["Q9 Age"]));
        assert_eq!(ctx.entries[0].source, ContextSource::Keyword);
        assert!(ctx.entries[0].snippet.contains("Age: 5"));
        assert_eq!(ctx.entries[0].key.to_string(), "Q9");
    }

    #[test]
    fn no_keyword_hit_uses_head() {
        let text = "a".repeat(5_000);
        let ctx = build_context(&text, &labels(&["zzz qqq"]));
        assert_eq!(ctx.entries[0].source, ContextSource::Head);
        assert_eq!(ctx.entries[0].snippet.chars().count(), HEAD_CHARS);
    }

    #[test]
    fn one_entry_per_position_even_with_colliding_ids() {
        let text = "Q1 a Q2 b";
        let ctx = build_context(text, &labels(&["Q1 x", "Q1 y", "plain", "plain"]));
        assert_eq!(ctx.len(), 4);
        assert_eq!(ctx.entries[2].key, ContextKey::Position(2));
        assert_eq!(ctx.entries[3].key, ContextKey::Position(3));
    }

    #[test]
    fn snippets_bounded_on_huge_input() {
        let mut text = String::from("Q1 ");
        text.push_str(&"あ".repeat(1_000_000));
        let ctx = build_context(&text, &labels(&["Q1 name", "Q2 missing", "nothing"]));
        for entry in &ctx.entries {
            assert!(entry.snippet.chars().count() <= CONTEXT_CAP_CHARS);
        }
    }

    #[test]
    fn empty_text_gives_empty_snippets() {
        let ctx = build_context("", &labels(&["Q1 Name", "color"]));
        assert_eq!(ctx.len(), 2);
        assert!(ctx.entries.iter().all(|e| e.snippet.is_empty()));
    }

    #[test]
    fn keywords_skip_marker() {
        assert_eq!(label_keywords("Q3 Favorite color"), vec!["Favorite", "color"]);
        assert_eq!(label_keywords("問5 あなたの 年齢 と 職業 を"), vec!["あなたの", "年齢", "職業"]);
        assert!(label_keywords("Q1 a").is_empty());
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("日本語テキスト", 3), "日本語");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }
}
