//! Bearer credential authentication middleware.
//!
//! Extracts `Authorization: Bearer <token>`, resolves it to a uid with the
//! configured `IdentityVerifier`, and injects `Caller` into request
//! extensions for downstream handlers.

use axum::http::header::AUTHORIZATION;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, Caller};
use crate::auth::bearer_token;

/// Require a verified caller.
///
/// Accesses `ApiContext` from request extensions (injected by Extension layer).
pub async fn require_auth(req: Request<axum::body::Body>, next: Next) -> Response {
    match require_auth_inner(req, next).await {
        Ok(resp) => resp,
        Err(err) => err.into_response(),
    }
}

async fn require_auth_inner(
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let ctx: ApiContext = req
        .extensions()
        .get::<ApiContext>()
        .cloned()
        .ok_or(ApiError::Internal("missing API context".into()))?;

    let header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    let token = bearer_token(header)?.to_string();

    // Verification is a blocking HTTP round trip.
    let verifier = ctx.verifier.clone();
    let uid = tokio::task::spawn_blocking(move || verifier.verify(&token))
        .await
        .map_err(|e| ApiError::Internal(format!("auth task failed: {e}")))??;

    req.extensions_mut().insert(Caller { uid });
    Ok(next.run(req).await)
}
