use super::types::{AnswerVector, SENTINEL};

/// Force a raw answer list to exactly `expected` entries.
///
/// Missing or blank entries become [`SENTINEL`]; a short list is padded
/// with it and a long one truncated. The result never has another length.
pub fn align<I>(raw: I, expected: usize) -> AnswerVector
where
    I: IntoIterator<Item = Option<String>>,
{
    let mut aligned: AnswerVector = raw
        .into_iter()
        .take(expected)
        .map(|entry| match entry {
            Some(value) if !value.trim().is_empty() => value.trim().to_string(),
            _ => SENTINEL.to_string(),
        })
        .collect();
    aligned.resize(expected, SENTINEL.to_string());

    debug_assert_eq!(aligned.len(), expected, "aligned vector length");
    aligned
}

/// A row of sentinels for a document that produced nothing usable.
pub fn sentinel_row(expected: usize) -> AnswerVector {
    vec![SENTINEL.to_string(); expected]
}
