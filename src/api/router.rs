//! HTTP router.
//!
//! Returns a composable `Router` that can be mounted on any axum server.
//! Protected routes run the auth middleware; `/health` does not. CORS,
//! tracing, and the upload size limit wrap every route.

use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::Method;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;

/// Upper bound on a request body (all files of one extraction request).
pub const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// Build the API router.
///
/// Middleware uses `Extension<ApiContext>` (injected as the outermost layer
/// of the protected routes). Handlers use `State<ApiContext>`.
pub fn api_router(ctx: ApiContext) -> Router {
    let protected = Router::new()
        .route("/templates", post(endpoints::templates::create))
        .route("/templates/sheet-id", get(endpoints::sheet::get_sheet_id))
        .route("/extract", post(endpoints::extract::run))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::auth::require_auth))
        // Extension must be outermost so middleware can extract ApiContext
        .layer(axum::Extension(ctx));

    let public = Router::new().route("/health", get(endpoints::health::check));

    Router::new()
        .merge(protected)
        .merge(public)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer())
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .max_age(Duration::from_secs(3600))
}
