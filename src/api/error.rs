//! API error types with structured JSON responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::auth::AuthError;
use crate::ocr::AcquisitionError;
use crate::service::ServiceError;
use crate::template::TemplateError;

/// Structured error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Authentication required")]
    Unauthorized,
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "AUTH_REQUIRED",
                "認証が必要です。".to_string(),
            ),
            ApiError::BadRequest(detail) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", detail),
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "サーバー内部でエラーが発生しました。".to_string(),
                )
            }
        };

        let body = ErrorBody {
            error: ErrorDetail { code, message },
        };
        (status, Json(body)).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingToken | AuthError::InvalidToken => ApiError::Unauthorized,
            // The token may be fine; the identity service is what failed.
            AuthError::Upstream(_) | AuthError::HttpClient(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        let bad_request = |message: String| ApiError::BadRequest(message);
        match err {
            ServiceError::MissingField("template_name" | "template") => {
                bad_request("テンプレート名が指定されていません。".into())
            }
            ServiceError::MissingField("spreadsheet_url") => {
                bad_request("スプレッドシートURLが指定されていません。".into())
            }
            ServiceError::MissingField(_) => bad_request("ファイルが含まれていません。".into()),
            ServiceError::EmptyUpload => {
                bad_request("アップロードされたファイルが空でした。".into())
            }
            ServiceError::TemplateNotFound(name) => {
                bad_request(format!("テンプレート「{name}」が見つかりません。"))
            }
            ServiceError::MissingDestination(_) => {
                bad_request("テンプレートに紐付いたスプレッドシートIDが存在しません。".into())
            }
            ServiceError::Template(TemplateError::NoText)
            | ServiceError::Acquisition(AcquisitionError::EmptyResult) => {
                bad_request("OCRでテキストを抽出できませんでした。".into())
            }
            ServiceError::Template(TemplateError::EmptySchema) => {
                bad_request("テンプレートから質問項目を抽出できませんでした。".into())
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}
