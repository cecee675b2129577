//! Completion capability: prompt in, generated text out.
//!
//! The pipeline only sees [`CompletionClient`]; the Gemini REST client is
//! the production implementation and [`MockCompletionClient`] scripts
//! responses for tests.

pub mod gemini;
pub mod mock;

pub use gemini::GeminiClient;
pub use mock::MockCompletionClient;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Rate limited by {model}")]
    RateLimited { model: String },

    #[error("Request to {model} timed out after {secs}s")]
    Timeout { model: String, secs: u64 },

    #[error("Response from {model} blocked by content filter: {reason}")]
    ContentFiltered { model: String, reason: String },

    #[error("Completion service unreachable: {0}")]
    Connection(String),

    #[error("Completion service returned error (status {status}): {body}")]
    Upstream { status: u16, body: String },

    #[error("Malformed model output: {0}")]
    MalformedOutput(String),

    #[error("Model returned no text")]
    EmptyResponse,

    #[error("HTTP client error: {0}")]
    HttpClient(String),
}

impl ModelError {
    /// Content-filter rejections are deterministic for a given prompt;
    /// repeating the same request will not change the outcome.
    pub fn is_content_filtered(&self) -> bool {
        matches!(self, ModelError::ContentFiltered { .. })
    }
}

/// Shape the caller wants the model to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputShape {
    FreeText,
    /// A JSON array of strings.
    StringArray,
}

/// Content-safety threshold applied to every harm category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyThreshold {
    BlockNone,
    BlockOnlyHigh,
    /// Leave the service defaults in place.
    Default,
}

impl std::str::FromStr for SafetyThreshold {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "block_none" | "none" => Ok(SafetyThreshold::BlockNone),
            "block_only_high" | "high" => Ok(SafetyThreshold::BlockOnlyHigh),
            "default" => Ok(SafetyThreshold::Default),
            other => Err(format!("unknown safety threshold: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub output_shape: OutputShape,
    pub safety: SafetyThreshold,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            max_output_tokens: 2_048,
            output_shape: OutputShape::FreeText,
            safety: SafetyThreshold::BlockNone,
        }
    }
}

/// Generated-text capability (allows mocking).
pub trait CompletionClient: Send + Sync {
    fn complete(
        &self,
        model: &str,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<String, ModelError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safety_threshold_parses() {
        assert_eq!("block_none".parse::<SafetyThreshold>(), Ok(SafetyThreshold::BlockNone));
        assert_eq!("HIGH".parse::<SafetyThreshold>(), Ok(SafetyThreshold::BlockOnlyHigh));
        assert_eq!("default".parse::<SafetyThreshold>(), Ok(SafetyThreshold::Default));
        assert!("strict".parse::<SafetyThreshold>().is_err());
    }

    #[test]
    fn content_filtered_is_distinguishable() {
        let filtered = ModelError::ContentFiltered {
            model: "m".into(),
            reason: "SAFETY".into(),
        };
        assert!(filtered.is_content_filtered());
        assert!(!ModelError::EmptyResponse.is_content_filtered());
    }

    #[test]
    fn client_trait_is_object_safe() {
        fn _assert(_: &dyn CompletionClient) {}
    }
}
