//! Question-schema analysis of a blank survey.
//!
//! The recognized text of the blank form is sent to the model, which
//! lists the answerable question items one per line. The normalized lines
//! become the schema and the destination's header row.

use std::sync::Arc;

use thiserror::Error;

use crate::llm::{CompletionClient, GenerationParams, ModelError, OutputShape, SafetyThreshold};
use crate::pipeline::context::truncate_chars;
use crate::pipeline::parser::strip_code_fence;
use crate::pipeline::types::QuestionSchema;

/// Recognized text beyond this many characters is not sent to the model.
pub const MAX_TEMPLATE_CHARS: usize = 120_000;

const BULLETS: &[char] = &['-', '*', '・', '•', '●', '○', '■', '□', '>'];

const TEMPLATE_PROMPT: &str = "\
あなたはアンケート設計を分析する専門家です。
以下のOCRテキストから、回答欄に相当する質問項目のみを抽出してください。
出力は1行に1項目の改行区切りのリストとし、質問番号(Q1、問2 など)があれば項目の先頭に残してください。
説明文・見出し・記入例は含めないでください。

OCRテキスト:
";

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Recognized text of the template is empty")]
    NoText,

    #[error("Model listed no question items")]
    EmptySchema,

    #[error("Template analysis failed on every model: {0}")]
    Model(#[from] ModelError),
}

pub struct TemplateAnalyzer {
    client: Arc<dyn CompletionClient>,
    models: Vec<String>,
    safety: SafetyThreshold,
}

impl TemplateAnalyzer {
    pub fn new(client: Arc<dyn CompletionClient>, models: Vec<String>, safety: SafetyThreshold) -> Self {
        Self {
            client,
            models,
            safety,
        }
    }

    /// Ask the ladder (first success wins) for the question items.
    pub fn derive_schema(&self, recognized_text: &str) -> Result<QuestionSchema, TemplateError> {
        let text = recognized_text.trim();
        if text.is_empty() {
            return Err(TemplateError::NoText);
        }

        let clamped = truncate_chars(text, MAX_TEMPLATE_CHARS);
        if clamped.len() < text.len() {
            tracing::info!(
                original_chars = text.chars().count(),
                kept_chars = MAX_TEMPLATE_CHARS,
                "Template text clamped"
            );
        }
        let prompt = format!("{TEMPLATE_PROMPT}{clamped}");
        let params = GenerationParams {
            temperature: 0.0,
            max_output_tokens: 8_192,
            output_shape: OutputShape::FreeText,
            safety: self.safety,
        };

        let mut last_error = ModelError::EmptyResponse;
        for model in &self.models {
            match self.client.complete(model, &prompt, &params) {
                Ok(response) => {
                    let schema = normalize_items(&response);
                    if schema.is_empty() {
                        return Err(TemplateError::EmptySchema);
                    }
                    tracing::info!(model = %model, questions = schema.len(), "Template analyzed");
                    return Ok(schema);
                }
                Err(e) => {
                    tracing::warn!(model = %model, error = %e, "Template analysis call failed");
                    last_error = e;
                }
            }
        }
        Err(TemplateError::Model(last_error))
    }
}

/// One schema entry per non-blank line, bullets removed.
pub fn normalize_items(response: &str) -> QuestionSchema {
    strip_code_fence(response)
        .lines()
        .map(|line| line.trim().trim_start_matches(BULLETS).trim())
        .filter(|line| !line.is_empty() && !line.starts_with("```"))
        .map(str::to_string)
        .collect()
}
