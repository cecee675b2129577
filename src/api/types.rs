//! Shared types for the HTTP layer.

use std::sync::Arc;

use serde::Serialize;

use crate::auth::IdentityVerifier;
use crate::service::SurveyService;

/// Shared context for all routes and middleware.
#[derive(Clone)]
pub struct ApiContext {
    pub service: Arc<SurveyService>,
    pub verifier: Arc<dyn IdentityVerifier>,
}

impl ApiContext {
    pub fn new(service: Arc<SurveyService>, verifier: Arc<dyn IdentityVerifier>) -> Self {
        Self { service, verifier }
    }
}

/// Verified caller, injected into request extensions by the auth middleware.
/// Templates are scoped to `uid`.
#[derive(Debug, Clone)]
pub struct Caller {
    pub uid: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetIdResponse {
    pub spreadsheet_id: String,
}
