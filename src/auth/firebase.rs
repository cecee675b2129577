//! Firebase ID-token verification through the Identity Toolkit REST API.

use serde::Deserialize;
use serde_json::json;

use super::{AuthError, IdentityVerifier};
use crate::google::truncate_body;

const DEFAULT_IDENTITY_URL: &str = "https://identitytoolkit.googleapis.com/v1";

#[derive(Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupUser {
    local_id: String,
}

pub struct FirebaseVerifier {
    base_url: String,
    api_key: String,
    client: reqwest::blocking::Client,
}

impl FirebaseVerifier {
    pub fn new(api_key: &str, timeout_secs: u64) -> Result<Self, AuthError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| AuthError::HttpClient(e.to_string()))?;
        Ok(Self {
            base_url: DEFAULT_IDENTITY_URL.to_string(),
            api_key: api_key.to_string(),
            client,
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }
}

impl IdentityVerifier for FirebaseVerifier {
    fn verify(&self, token: &str) -> Result<String, AuthError> {
        let response = self
            .client
            .post(format!("{}/accounts:lookup", self.base_url))
            .query(&[("key", self.api_key.as_str())])
            .json(&json!({ "idToken": token }))
            .send()
            .map_err(|e| AuthError::Upstream(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|e| AuthError::Upstream(e.to_string()))?;

        // Expired, revoked or malformed tokens come back as 400.
        if status == reqwest::StatusCode::BAD_REQUEST {
            return Err(AuthError::InvalidToken);
        }
        if !status.is_success() {
            return Err(AuthError::Upstream(format!(
                "status {}: {}",
                status.as_u16(),
                truncate_body(body)
            )));
        }
        parse_lookup(&body)
    }
}

fn parse_lookup(body: &str) -> Result<String, AuthError> {
    let lookup: LookupResponse = serde_json::from_str(body)
        .map_err(|e| AuthError::Upstream(format!("unexpected lookup response: {e}")))?;
    lookup
        .users
        .into_iter()
        .next()
        .map(|user| user.local_id)
        .filter(|uid| !uid.is_empty())
        .ok_or(AuthError::InvalidToken)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_returns_local_id() {
        let body = r#"{"kind":"identitytoolkit#GetAccountInfoResponse","users":[{"localId":"uid-42","email":"a@b.c"}]}"#;
        assert_eq!(parse_lookup(body), Ok("uid-42".to_string()));
    }

    #[test]
    fn lookup_without_users_is_invalid() {
        assert_eq!(parse_lookup(r#"{"users":[]}"#), Err(AuthError::InvalidToken));
        assert_eq!(parse_lookup("{}"), Err(AuthError::InvalidToken));
    }

    #[test]
    fn garbage_lookup_is_upstream_error() {
        assert!(matches!(parse_lookup("<html>"), Err(AuthError::Upstream(_))));
    }
}
