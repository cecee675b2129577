//! Gemini `generateContent` REST client.
//!
//! Responses are decoded against an ordered list of shapes: the current
//! candidates/parts layout first, then a prompt-level block, then the
//! older single-`text` and `candidates[].output` layouts.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::google::truncate_body;

use super::{CompletionClient, GenerationParams, ModelError, OutputShape, SafetyThreshold};

const HARM_CATEGORIES: &[&str] = &[
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

/// Finish reasons that mean the candidate was withheld by a safety system.
const FILTERED_FINISH_REASONS: &[&str] = &["SAFETY", "PROHIBITED_CONTENT", "BLOCKLIST", "SPII"];

pub struct GeminiClient {
    base_url: String,
    api_key: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl GeminiClient {
    pub fn new(base_url: &str, api_key: &str, timeout_secs: u64) -> Result<Self, ModelError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ModelError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client,
            timeout_secs,
        })
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model)
    }
}

// ──────────────────────────────────────────────
// Request
// ──────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<RequestContent<'a>>,
    generation_config: GenerationConfig,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    safety_settings: Vec<SafetySetting>,
}

#[derive(Serialize)]
struct RequestContent<'a> {
    role: &'static str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<Value>,
}

#[derive(Serialize)]
struct SafetySetting {
    category: &'static str,
    threshold: &'static str,
}

fn build_request<'a>(prompt: &'a str, params: &GenerationParams) -> GenerateContentRequest<'a> {
    let (response_mime_type, response_schema) = match params.output_shape {
        OutputShape::FreeText => (None, None),
        OutputShape::StringArray => (
            Some("application/json"),
            Some(json!({ "type": "ARRAY", "items": { "type": "STRING" } })),
        ),
    };

    let threshold = match params.safety {
        SafetyThreshold::BlockNone => Some("BLOCK_NONE"),
        SafetyThreshold::BlockOnlyHigh => Some("BLOCK_ONLY_HIGH"),
        SafetyThreshold::Default => None,
    };
    let safety_settings = threshold
        .map(|threshold| {
            HARM_CATEGORIES
                .iter()
                .map(|category| SafetySetting {
                    category: *category,
                    threshold,
                })
                .collect()
        })
        .unwrap_or_default();

    GenerateContentRequest {
        contents: vec![RequestContent {
            role: "user",
            parts: vec![RequestPart { text: prompt }],
        }],
        generation_config: GenerationConfig {
            temperature: params.temperature,
            max_output_tokens: params.max_output_tokens,
            response_mime_type,
            response_schema,
        },
        safety_settings,
    }
}

// ──────────────────────────────────────────────
// Response decoding
// ──────────────────────────────────────────────

#[derive(Debug, PartialEq)]
enum Decoded {
    Text(String),
    Filtered(String),
    Empty,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StandardResponse {
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlockedPromptResponse {
    prompt_feedback: PromptFeedback,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize)]
struct PlainTextResponse {
    text: String,
}

#[derive(Deserialize)]
struct LegacyOutputResponse {
    candidates: Vec<LegacyCandidate>,
}

#[derive(Deserialize)]
struct LegacyCandidate {
    output: String,
}

type ShapeDecoder = fn(&Value) -> Option<Decoded>;

/// Tried in order; the first decoder that recognizes the body wins.
const SHAPE_DECODERS: &[ShapeDecoder] = &[
    decode_standard,
    decode_blocked_prompt,
    decode_plain_text,
    decode_legacy_output,
];

fn decode_standard(value: &Value) -> Option<Decoded> {
    let response: StandardResponse = serde_json::from_value(value.clone()).ok()?;
    let candidate = response.candidates.into_iter().next()?;
    if candidate.content.is_none() && candidate.finish_reason.is_none() {
        return None;
    }

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if !text.trim().is_empty() {
        return Some(Decoded::Text(text));
    }
    match candidate.finish_reason {
        Some(reason) if FILTERED_FINISH_REASONS.contains(&reason.as_str()) => {
            Some(Decoded::Filtered(reason))
        }
        _ => Some(Decoded::Empty),
    }
}

fn decode_blocked_prompt(value: &Value) -> Option<Decoded> {
    let response: BlockedPromptResponse = serde_json::from_value(value.clone()).ok()?;
    Some(match response.prompt_feedback.block_reason {
        Some(reason) => Decoded::Filtered(reason),
        None => Decoded::Empty,
    })
}

fn decode_plain_text(value: &Value) -> Option<Decoded> {
    let response: PlainTextResponse = serde_json::from_value(value.clone()).ok()?;
    Some(if response.text.trim().is_empty() {
        Decoded::Empty
    } else {
        Decoded::Text(response.text)
    })
}

fn decode_legacy_output(value: &Value) -> Option<Decoded> {
    let response: LegacyOutputResponse = serde_json::from_value(value.clone()).ok()?;
    let output = response.candidates.into_iter().next()?.output;
    Some(if output.trim().is_empty() {
        Decoded::Empty
    } else {
        Decoded::Text(output)
    })
}

fn decode_response(body: &str) -> Result<Decoded, ModelError> {
    let value: Value =
        serde_json::from_str(body).map_err(|e| ModelError::MalformedOutput(e.to_string()))?;
    SHAPE_DECODERS
        .iter()
        .find_map(|decode| decode(&value))
        .ok_or_else(|| ModelError::MalformedOutput("unrecognized response shape".into()))
}

impl CompletionClient for GeminiClient {
    fn complete(
        &self,
        model: &str,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<String, ModelError> {
        let body = build_request(prompt, params);

        let response = self
            .client
            .post(self.endpoint(model))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    ModelError::Timeout {
                        model: model.to_string(),
                        secs: self.timeout_secs,
                    }
                } else if e.is_connect() {
                    ModelError::Connection(self.base_url.clone())
                } else {
                    ModelError::HttpClient(e.to_string())
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ModelError::RateLimited {
                model: model.to_string(),
            });
        }

        let text = response.text().map_err(|e| {
            if e.is_timeout() {
                ModelError::Timeout {
                    model: model.to_string(),
                    secs: self.timeout_secs,
                }
            } else {
                ModelError::HttpClient(e.to_string())
            }
        })?;

        if !status.is_success() {
            return Err(ModelError::Upstream {
                status: status.as_u16(),
                body: truncate_body(text),
            });
        }

        match decode_response(&text)? {
            Decoded::Text(text) => Ok(text),
            Decoded::Filtered(reason) => Err(ModelError::ContentFiltered {
                model: model.to_string(),
                reason,
            }),
            Decoded::Empty => Err(ModelError::EmptyResponse),
        }
    }
}
