//! Chunked answer extraction with a two-model fallback ladder.
//!
//! The schema is split into fixed-size batches. Each batch runs through
//! [`BatchState`]: primary call, one stricter retry on the primary, one
//! call on the secondary, then sentinels. Every batch contributes exactly
//! as many answers as it has questions.

use std::sync::Arc;

use super::align::{align, sentinel_row};
use super::context::build_context;
use super::parser::parse_answer_array;
use super::prompt::build_batch_prompt;
use super::sanitize::{normalize_terms, sanitize};
use super::types::{AnswerVector, ContextEntry};
use crate::llm::{CompletionClient, GenerationParams, ModelError, OutputShape, SafetyThreshold};

pub const MIN_BATCH_SIZE: usize = 6;
pub const MAX_BATCH_SIZE: usize = 10;

/// Tunables for chunking, the model ladder, and generation parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionConfig {
    /// Questions per model call. Clamped to 6..=10 when used.
    pub batch_size: usize,
    /// First rung of the fallback ladder.
    pub primary_model: String,
    /// Faster, cheaper second rung.
    pub secondary_model: String,
    pub temperature: f32,
    /// Temperature for the same-model retry.
    pub retry_temperature: f32,
    pub max_output_tokens: u32,
    pub safety: SafetyThreshold,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            batch_size: 8,
            primary_model: "gemini-2.5-flash".to_string(),
            secondary_model: "gemini-2.5-flash-lite".to_string(),
            temperature: 0.2,
            retry_temperature: 0.0,
            max_output_tokens: 4_096,
            safety: SafetyThreshold::BlockNone,
        }
    }
}

impl ExtractionConfig {
    pub fn effective_batch_size(&self) -> usize {
        self.batch_size.clamp(MIN_BATCH_SIZE, MAX_BATCH_SIZE)
    }

    /// Ladder models in call order.
    pub fn models(&self) -> [&str; 2] {
        [self.primary_model.as_str(), self.secondary_model.as_str()]
    }
}

/// Per-batch progress through the fallback ladder.
#[derive(Debug)]
enum BatchState {
    Pending,
    RetryPrimary,
    TrySecondary,
    Done(Vec<Option<String>>),
    DoneWithSentinels,
}

pub struct ChunkedExtractor {
    client: Arc<dyn CompletionClient>,
    config: ExtractionConfig,
}

impl ChunkedExtractor {
    pub fn new(client: Arc<dyn CompletionClient>, config: ExtractionConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Extract one answer per schema entry from recognized text.
    ///
    /// Never fails: batches the ladder cannot answer are filled with
    /// sentinels. The result has `schema.len()` entries.
    pub fn extract(&self, text: &str, schema: &[String]) -> AnswerVector {
        if schema.is_empty() {
            return Vec::new();
        }

        let text = sanitize(text);
        let labels: Vec<String> = schema
            .iter()
            .map(|label| normalize_terms(label).trim().to_string())
            .collect();
        let context = build_context(&text, &labels);
        let batch_size = self.config.effective_batch_size();

        let mut answers = Vec::with_capacity(schema.len());
        for (batch_index, batch) in context.entries.chunks(batch_size).enumerate() {
            let _span = tracing::info_span!("extract_batch", batch_index, questions = batch.len())
                .entered();
            answers.extend(self.run_batch(batch));
        }
        answers
    }

    fn run_batch(&self, batch: &[ContextEntry]) -> AnswerVector {
        let expected = batch.len();
        let primary = self.config.primary_model.as_str();
        let secondary = self.config.secondary_model.as_str();

        let mut state = BatchState::Pending;
        loop {
            state = match state {
                BatchState::Pending => match self.attempt(primary, batch, false) {
                    Ok(raw) => BatchState::Done(raw),
                    Err(e) => {
                        log_failure(primary, &e);
                        BatchState::RetryPrimary
                    }
                },
                BatchState::RetryPrimary => match self.attempt(primary, batch, true) {
                    Ok(raw) => BatchState::Done(raw),
                    Err(e) => {
                        log_failure(primary, &e);
                        BatchState::TrySecondary
                    }
                },
                BatchState::TrySecondary => match self.attempt(secondary, batch, false) {
                    Ok(raw) => BatchState::Done(raw),
                    Err(e) => {
                        log_failure(secondary, &e);
                        BatchState::DoneWithSentinels
                    }
                },
                BatchState::Done(raw) => {
                    if raw.len() != expected {
                        tracing::debug!(
                            returned = raw.len(),
                            expected,
                            "Answer count mismatch, aligning batch"
                        );
                    }
                    return align(raw, expected);
                }
                BatchState::DoneWithSentinels => {
                    tracing::warn!(expected, "Fallback ladder exhausted, filling batch with sentinels");
                    return sentinel_row(expected);
                }
            };
        }
    }

    fn attempt(
        &self,
        model: &str,
        batch: &[ContextEntry],
        strict: bool,
    ) -> Result<Vec<Option<String>>, ModelError> {
        let prompt = build_batch_prompt(batch, strict);
        let params = GenerationParams {
            temperature: if strict {
                self.config.retry_temperature
            } else {
                self.config.temperature
            },
            max_output_tokens: self.config.max_output_tokens,
            output_shape: OutputShape::StringArray,
            safety: self.config.safety,
        };
        let response = self.client.complete(model, &prompt, &params)?;
        parse_answer_array(&response)
    }
}

fn log_failure(model: &str, error: &ModelError) {
    if error.is_content_filtered() {
        tracing::warn!(model, error = %error, "Batch rejected by content filter");
    } else {
        tracing::warn!(model, error = %error, "Batch extraction call failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockCompletionClient;
    use crate::pipeline::prompt::STRICT_SUFFIX;
    use crate::pipeline::types::SENTINEL;

    fn schema(labels: &[&str]) -> Vec<String> {
        labels.iter().map(|s| s.to_string()).collect()
    }

    fn config(batch_size: usize) -> ExtractionConfig {
        ExtractionConfig {
            batch_size,
            primary_model: "primary".into(),
            secondary_model: "secondary".into(),
            ..ExtractionConfig::default()
        }
    }

    fn extractor(client: &Arc<MockCompletionClient>, batch_size: usize) -> ChunkedExtractor {
        ChunkedExtractor::new(client.clone(), config(batch_size))
    }

    fn filtered(model: &str) -> ModelError {
        ModelError::ContentFiltered {
            model: model.into(),
            reason: "SAFETY".into(),
        }
    }

    #[test]
    fn batch_size_is_clamped() {
        assert_eq!(config(2).effective_batch_size(), 6);
        assert_eq!(config(8).effective_batch_size(), 8);
        assert_eq!(config(50).effective_batch_size(), 10);
        assert_eq!(ExtractionConfig::default().models(), ["gemini-2.5-flash", "gemini-2.5-flash-lite"]);
    }

    #[test]
    fn empty_schema_makes_no_calls() {
        let client = Arc::new(MockCompletionClient::new("[\"x\"]"));
        let answers = extractor(&client, 8).extract("Q1 anything", &[]);
        assert!(answers.is_empty());
        assert_eq!(client.call_count(), 0);
    }

    #[test]
    fn primary_success_uses_one_call() {
        let client = Arc::new(MockCompletionClient::new(r#"["Alice", "5"]"#));
        let answers = extractor(&client, 8).extract("Q1 Name: Alice\nQ2 Age: 5", &schema(&["Q1 Name", "Q2 Age"]));
        assert_eq!(answers, vec!["Alice", "5"]);

        let calls = client.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].model, "primary");
        assert_eq!(calls[0].params.output_shape, OutputShape::StringArray);
        assert_eq!(calls[0].params.safety, SafetyThreshold::BlockNone);
        assert!(!calls[0].prompt.contains(STRICT_SUFFIX));
    }

    #[test]
    fn malformed_primary_is_retried_strictly() {
        let client = Arc::new(MockCompletionClient::scripted(vec![
            Ok("Alice is the name".into()),
            Ok(r#"["Alice"]"#.into()),
        ]));
        let answers = extractor(&client, 8).extract("Q1 Name: Alice", &schema(&["Q1 Name"]));
        assert_eq!(answers, vec!["Alice"]);

        let calls = client.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].model, "primary");
        assert_eq!(calls[1].params.temperature, 0.0);
        assert!(calls[1].prompt.contains(STRICT_SUFFIX));
    }

    #[test]
    fn failed_retry_falls_to_secondary() {
        let client = Arc::new(MockCompletionClient::scripted(vec![
            Err(ModelError::Timeout { model: "primary".into(), secs: 120 }),
            Err(ModelError::RateLimited { model: "primary".into() }),
            Ok(r#"["Alice"]"#.into()),
        ]));
        let answers = extractor(&client, 8).extract("Q1 Name: Alice", &schema(&["Q1 Name"]));
        assert_eq!(answers, vec!["Alice"]);

        let models: Vec<String> = client.calls().into_iter().map(|c| c.model).collect();
        assert_eq!(models, vec!["primary", "primary", "secondary"]);
    }

    #[test]
    fn content_filter_follows_full_ladder() {
        let client = Arc::new(MockCompletionClient::scripted(vec![
            Err(filtered("primary")),
            Err(filtered("primary")),
            Ok(r#"["male"]"#.into()),
        ]));
        let answers = extractor(&client, 8).extract("Q1 gender: male", &schema(&["Q1 gender"]));
        assert_eq!(answers, vec!["male"]);

        let calls = client.calls();
        let models: Vec<&str> = calls.iter().map(|c| c.model.as_str()).collect();
        assert_eq!(models, vec!["primary", "primary", "secondary"]);
        assert!(calls[1].prompt.contains(STRICT_SUFFIX));
        assert_eq!(calls[1].params.temperature, 0.0);
    }

    #[test]
    fn filtered_primary_can_recover_on_strict_retry() {
        let client = Arc::new(MockCompletionClient::scripted(vec![
            Err(filtered("primary")),
            Ok(r#"["female"]"#.into()),
        ]));
        let answers = extractor(&client, 8).extract("Q1 gender: female", &schema(&["Q1 gender"]));
        assert_eq!(answers, vec!["female"]);
        assert_eq!(client.call_count(), 2);
    }

    #[test]
    fn ladder_exhaustion_fills_batch_with_sentinels() {
        let client = Arc::new(MockCompletionClient::with_responder(|model, _, _| {
            Err(filtered(model))
        }));
        let labels = schema(&["Q1 a", "Q2 b", "Q3 c"]);
        let answers = extractor(&client, 8).extract("Q1 x Q2 y Q3 z", &labels);
        assert_eq!(answers, vec![SENTINEL; 3]);
        assert_eq!(client.call_count(), 3);
    }

    #[test]
    fn exhaustion_is_per_batch() {
        // First batch (6 questions) fails everywhere, second batch answers.
        let client = Arc::new(MockCompletionClient::scripted(vec![
            Err(ModelError::EmptyResponse),
            Err(ModelError::EmptyResponse),
            Err(ModelError::EmptyResponse),
            Ok(r#"["seven"]"#.into()),
        ]));
        let labels: Vec<String> = (1..=7).map(|i| format!("Q{i} item")).collect();
        let answers = extractor(&client, 6).extract("Q1 a", &labels);
        assert_eq!(answers.len(), 7);
        assert!(answers[..6].iter().all(|a| a == SENTINEL));
        assert_eq!(answers[6], "seven");
    }

    #[test]
    fn short_batch_is_padded_before_next_batch() {
        let client = Arc::new(MockCompletionClient::scripted(vec![
            Ok(r#"["a1", "a2", "a3", "a4", "a5"]"#.into()),
            Ok(r#"["a7"]"#.into()),
        ]));
        let labels: Vec<String> = (1..=7).map(|i| format!("Q{i} item")).collect();
        let answers = extractor(&client, 6).extract("Q1 a", &labels);
        assert_eq!(answers, vec!["a1", "a2", "a3", "a4", "a5", SENTINEL, "a7"]);
        assert_eq!(client.call_count(), 2);
    }

    #[test]
    fn long_batch_is_truncated() {
        let client = Arc::new(MockCompletionClient::new(r#"["a", "b", "extra"]"#));
        let answers = extractor(&client, 8).extract("Q1 a Q2 b", &schema(&["Q1 a", "Q2 b"]));
        assert_eq!(answers, vec!["a", "b"]);
    }

    #[test]
    fn prompt_carries_only_batch_questions() {
        let client = Arc::new(MockCompletionClient::with_responder(|_, _, _| Ok("[]".into())));
        let labels: Vec<String> = (1..=7).map(|i| format!("Q{i} item{i}")).collect();
        extractor(&client, 6).extract("Q1 one Q7 seven", &labels);

        let calls = client.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].prompt.contains("Q6 item6"));
        assert!(!calls[0].prompt.contains("Q7 item7"));
        assert!(calls[1].prompt.contains("1. Q7 item7"));
    }

    #[test]
    fn labels_share_the_text_normalization() {
        let client = Arc::new(MockCompletionClient::new(r#"["山田", "男性"]"#));
        let text = format!("Q1 お名前: 山田\n{}\n性別: 男性", "あ".repeat(2_000));
        let answers = extractor(&client, 8).extract(&text, &schema(&["Q1 お名前", "性別"]));
        assert_eq!(answers, vec!["山田", "男性"]);

        let prompt = &client.calls()[0].prompt;
        assert!(prompt.contains("2. 男女区分"));
        assert!(prompt.contains("男女区分: 男性"));
        assert!(!prompt.contains("性別"));
    }

    #[test]
    fn full_width_label_finds_its_block() {
        let client = Arc::new(MockCompletionClient::new(r#"["42"]"#));
        extractor(&client, 8).extract("前文\nQ1 年齢: 42", &schema(&["Ｑ１　年齢"]));

        let prompt = &client.calls()[0].prompt;
        assert!(prompt.contains("1. Q1 年齢"));
        assert!(prompt.contains("[Q1]"));
    }
}
