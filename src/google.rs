//! Credentials and helpers shared by the Google REST adapters
//! (Vision, Cloud Storage, Sheets).

use reqwest::blocking::RequestBuilder;

/// Longest upstream error body kept in an error value.
pub const MAX_ERROR_BODY: usize = 512;

/// How a REST request authenticates.
#[derive(Clone, PartialEq, Eq)]
pub enum GoogleAuth {
    /// `x-goog-api-key` header. Accepted by Vision and Gemini only.
    ApiKey(String),
    /// OAuth access token.
    Bearer(String),
    /// No credentials; the upstream answers 401/403 for protected resources.
    Anonymous,
}

impl GoogleAuth {
    /// API key wins when both are configured.
    pub fn from_parts(api_key: Option<&str>, access_token: Option<&str>) -> Self {
        match (api_key, access_token) {
            (Some(key), _) if !key.trim().is_empty() => GoogleAuth::ApiKey(key.trim().to_string()),
            (_, Some(token)) if !token.trim().is_empty() => {
                GoogleAuth::Bearer(token.trim().to_string())
            }
            _ => GoogleAuth::Anonymous,
        }
    }

    pub fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        match self {
            GoogleAuth::ApiKey(key) => request.header("x-goog-api-key", key),
            GoogleAuth::Bearer(token) => request.bearer_auth(token),
            GoogleAuth::Anonymous => request,
        }
    }
}

// Credentials never reach log output.
impl std::fmt::Debug for GoogleAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GoogleAuth::ApiKey(_) => f.write_str("ApiKey(***)"),
            GoogleAuth::Bearer(_) => f.write_str("Bearer(***)"),
            GoogleAuth::Anonymous => f.write_str("Anonymous"),
        }
    }
}

/// Cut an upstream error body to [`MAX_ERROR_BODY`] bytes on a char boundary.
pub fn truncate_body(mut body: String) -> String {
    if body.len() > MAX_ERROR_BODY {
        let cut = (0..=MAX_ERROR_BODY)
            .rev()
            .find(|i| body.is_char_boundary(*i))
            .unwrap_or(0);
        body.truncate(cut);
    }
    body
}
