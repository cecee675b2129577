//! Decoding of the model's answer array.
//!
//! The strict shape (`["a", null, "b"]`) is tried first, then the shapes
//! models drift into: mixed scalars, an object wrapping the array, and an
//! array embedded in prose. Anything else is a malformed answer.

use serde::Deserialize;
use serde_json::Value;

use crate::llm::ModelError;

#[derive(Deserialize)]
#[serde(untagged)]
enum AnswerPayload {
    Strings(Vec<Option<String>>),
    Scalars(Vec<Value>),
    Wrapped {
        #[serde(alias = "results", alias = "values")]
        answers: Vec<Value>,
    },
}

impl AnswerPayload {
    fn into_answers(self) -> Vec<Option<String>> {
        match self {
            AnswerPayload::Strings(values) => values,
            AnswerPayload::Scalars(values) | AnswerPayload::Wrapped { answers: values } => {
                values.into_iter().map(coerce_value).collect()
            }
        }
    }
}

/// Parse a model response into an ordered answer list.
pub fn parse_answer_array(response: &str) -> Result<Vec<Option<String>>, ModelError> {
    let body = strip_code_fence(response);

    if let Ok(payload) = serde_json::from_str::<AnswerPayload>(body) {
        return Ok(payload.into_answers());
    }

    if let (Some(start), Some(end)) = (body.find('['), body.rfind(']')) {
        if start < end {
            if let Ok(payload) = serde_json::from_str::<AnswerPayload>(&body[start..=end]) {
                return Ok(payload.into_answers());
            }
        }
    }

    Err(ModelError::MalformedOutput(format!(
        "expected a JSON array of strings, got {} chars",
        body.chars().count()
    )))
}

/// Remove a surrounding Markdown code fence (```json ... ```), if any.
pub fn strip_code_fence(response: &str) -> &str {
    let trimmed = response.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (`json`) on the opening line.
    let rest = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
    };
    rest.trim_end().trim_end_matches("```").trim()
}

fn coerce_value(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(items) => {
            let parts: Vec<String> = items.into_iter().filter_map(coerce_value).collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join(", "))
            }
        }
        Value::Object(_) => Some(value.to_string()),
    }
}
