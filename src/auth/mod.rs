//! Caller identity: bearer credential in, stable subject id out.

pub mod firebase;

pub use firebase::FirebaseVerifier;

use std::collections::HashMap;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AuthError {
    #[error("Authorization header missing or not a bearer credential")]
    MissingToken,

    #[error("Credential rejected")]
    InvalidToken,

    #[error("Identity service error: {0}")]
    Upstream(String),

    #[error("HTTP client error: {0}")]
    HttpClient(String),
}

/// Identity verification capability (allows mocking).
pub trait IdentityVerifier: Send + Sync {
    /// Subject id (user uid) for a valid credential.
    fn verify(&self, token: &str) -> Result<String, AuthError>;
}

/// Credential from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: Option<&str>) -> Result<&str, AuthError> {
    let value = header.ok_or(AuthError::MissingToken)?.trim();
    let (scheme, token) = value.split_once(' ').ok_or(AuthError::MissingToken)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::MissingToken);
    }
    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::MissingToken);
    }
    Ok(token)
}

/// Verifier with a fixed token → uid table (for testing).
#[derive(Default)]
pub struct StaticVerifier {
    tokens: HashMap<String, String>,
}

impl StaticVerifier {
    pub fn new<I, K, V>(tokens: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            tokens: tokens
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl IdentityVerifier for StaticVerifier {
    fn verify(&self, token: &str) -> Result<String, AuthError> {
        self.tokens.get(token).cloned().ok_or(AuthError::InvalidToken)
    }
}
