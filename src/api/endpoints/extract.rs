//! `POST /extract`: extract answers from filled surveys into the
//! template's destination.

use axum::extract::{Multipart, State};
use axum::{Extension, Json};

use super::{run_blocking, UploadForm};
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, Caller};
use crate::pipeline::BatchResult;

/// Multipart fields: `template_name`, `files` (repeated).
pub async fn run(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<Caller>,
    multipart: Multipart,
) -> Result<Json<BatchResult>, ApiError> {
    let mut form = UploadForm::read(multipart).await?;
    let template_name = form.field("template_name").to_string();
    let files = form.take_files("files");

    tracing::info!(files = files.len(), "Extraction request received");

    let result = run_blocking(move || {
        ctx.service
            .extract_batch(&caller.uid, &template_name, &files)
            .map_err(ApiError::from)
    })
    .await?;
    Ok(Json(result))
}
