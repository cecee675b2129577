//! `POST /templates`: derive a question schema from a blank survey.

use axum::extract::{Multipart, State};
use axum::Extension;

use super::{run_blocking, UploadForm};
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, Caller};
use crate::service::ServiceError;

/// Multipart fields: `template_name`, `spreadsheet_url`, `file`.
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<Caller>,
    multipart: Multipart,
) -> Result<String, ApiError> {
    let mut form = UploadForm::read(multipart).await?;
    let template_name = form.field("template_name").trim().to_string();
    let spreadsheet_url = form.field("spreadsheet_url").to_string();
    let file = form.take_files("file").into_iter().next();

    // Field checks run in form order before the upload itself is looked at.
    if template_name.is_empty() {
        return Err(ServiceError::MissingField("template_name").into());
    }
    if spreadsheet_url.trim().is_empty() {
        return Err(ServiceError::MissingField("spreadsheet_url").into());
    }
    let file = file.ok_or(ServiceError::MissingField("file"))?;

    let name = template_name.clone();
    run_blocking(move || {
        ctx.service
            .analyze_template(&caller.uid, &name, &spreadsheet_url, &file)
            .map_err(ApiError::from)
    })
    .await?;

    Ok(format!("テンプレート「{template_name}」を作成しました。"))
}
