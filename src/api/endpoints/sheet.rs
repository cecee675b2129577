//! `GET /templates/sheet-id?template=`: stored destination of a template.

use axum::extract::{Query, State};
use axum::{Extension, Json};
use serde::Deserialize;

use super::run_blocking;
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, Caller, SheetIdResponse};

#[derive(Debug, Deserialize)]
pub struct SheetIdQuery {
    #[serde(default)]
    pub template: String,
}

pub async fn get_sheet_id(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<Caller>,
    Query(query): Query<SheetIdQuery>,
) -> Result<Json<SheetIdResponse>, ApiError> {
    let spreadsheet_id = run_blocking(move || {
        ctx.service
            .get_destination(&caller.uid, &query.template)
            .map_err(ApiError::from)
    })
    .await?;
    Ok(Json(SheetIdResponse { spreadsheet_id }))
}
