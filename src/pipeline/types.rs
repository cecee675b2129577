use serde::{Deserialize, Serialize};

/// Placeholder for an answer that could not be resolved.
pub const SENTINEL: &str = "N/A";

/// Ordered question labels. Position is identity; labels may repeat.
pub type QuestionSchema = Vec<String>;

/// One answer per schema position, either extracted text or [`SENTINEL`].
pub type AnswerVector = Vec<String>;

/// Numeric or hyphenated question identifier such as `37` or `39-1`.
///
/// Leading zeros are dropped from every numeric part so that `Q07`
/// and `問7` resolve to the same block.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QuestionId(String);

impl QuestionId {
    /// Normalize a captured marker token (`"07"`, `"39－01"`) into an id.
    pub fn from_token(token: &str) -> Option<Self> {
        let token: String = token
            .chars()
            .map(|c| match c {
                '０'..='９' => char::from_u32(c as u32 - 0xFEE0).unwrap_or(c),
                '－' | '‐' => '-',
                _ => c,
            })
            .collect();
        let mut parts = Vec::with_capacity(2);
        for part in token.split('-') {
            if part.is_empty() || !part.chars().all(|c| c.is_ascii_digit()) {
                return None;
            }
            let trimmed = part.trim_start_matches('0');
            parts.push(if trimmed.is_empty() { "0" } else { trimmed });
        }
        if parts.is_empty() || parts.len() > 2 {
            return None;
        }
        Some(Self(parts.join("-")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parent id for a sub-question (`39-1` → `39`).
    pub fn parent(&self) -> Option<QuestionId> {
        self.0
            .split_once('-')
            .map(|(prefix, _)| QuestionId(prefix.to_string()))
    }
}

impl std::fmt::Display for QuestionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Key of a context entry: the parsed id, or a synthetic positional key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextKey {
    Question(QuestionId),
    Position(usize),
}

impl std::fmt::Display for ContextKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContextKey::Question(id) => write!(f, "Q{id}"),
            ContextKey::Position(idx) => write!(f, "idx{idx}"),
        }
    }
}

/// How a context snippet was resolved for a schema entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextSource {
    /// The question's own segmented block.
    Block,
    /// The parent block of a sub-question.
    ParentBlock,
    /// Window around the first label keyword found in the text.
    Keyword,
    /// Head of the document; nothing more specific was found.
    Head,
}

#[derive(Debug, Clone)]
pub struct ContextEntry {
    pub key: ContextKey,
    pub label: String,
    pub snippet: String,
    pub source: ContextSource,
}

/// One bounded snippet per schema position, in schema order.
///
/// Rebuilt for every document; never shared between documents.
#[derive(Debug, Clone, Default)]
pub struct ExtractionContext {
    pub entries: Vec<ContextEntry>,
}

impl ExtractionContext {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Aggregated result of one extraction request.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    pub processed_count: u32,
    pub failed_count: u32,
    /// Documents never started because the request deadline passed.
    pub skipped_count: u32,
    pub rows: Vec<AnswerVector>,
}

impl BatchResult {
    pub fn empty() -> Self {
        Self::default()
    }
}

/// A document as uploaded: raw bytes plus whatever type hints came with it.
#[derive(Debug, Clone)]
pub struct DocumentInput {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
    pub file_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn question_id_strips_leading_zeros() {
        assert_eq!(QuestionId::from_token("07").unwrap().as_str(), "7");
        assert_eq!(QuestionId::from_token("39-01").unwrap().as_str(), "39-1");
        assert_eq!(QuestionId::from_token("0").unwrap().as_str(), "0");
    }

    #[test]
    fn question_id_accepts_fullwidth_forms() {
        assert_eq!(QuestionId::from_token("3－1").unwrap().as_str(), "3-1");
        assert_eq!(QuestionId::from_token("１２").unwrap().as_str(), "12");
    }

    #[test]
    fn question_id_rejects_garbage() {
        assert!(QuestionId::from_token("").is_none());
        assert!(QuestionId::from_token("a1").is_none());
        assert!(QuestionId::from_token("1-2-3").is_none());
        assert!(QuestionId::from_token("1-").is_none());
    }

    #[test]
    fn parent_of_sub_question() {
        let id = QuestionId::from_token("39-1").unwrap();
        assert_eq!(id.parent().unwrap().as_str(), "39");
        assert!(QuestionId::from_token("39").unwrap().parent().is_none());
    }

    #[test]
    fn context_key_display() {
        let id = QuestionId::from_token("4").unwrap();
        assert_eq!(ContextKey::Question(id).to_string(), "Q4");
        assert_eq!(ContextKey::Position(2).to_string(), "idx2");
    }

    #[test]
    fn batch_result_serializes_camel_case() {
        let result = BatchResult {
            processed_count: 2,
            failed_count: 1,
            skipped_count: 0,
            rows: vec![vec!["a".into()]],
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["processedCount"], 2);
        assert_eq!(json["failedCount"], 1);
        assert_eq!(json["rows"][0][0], "a");
    }
}
