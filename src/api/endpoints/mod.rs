//! Route handlers. Each handler moves the blocking service call onto the
//! blocking pool.

pub mod extract;
pub mod health;
pub mod sheet;
pub mod templates;

use std::collections::HashMap;

use axum::extract::Multipart;

use crate::api::error::ApiError;
use crate::pipeline::DocumentInput;

/// Text fields and uploaded files of one multipart request.
#[derive(Debug, Default)]
pub struct UploadForm {
    fields: HashMap<String, String>,
    files: HashMap<String, Vec<DocumentInput>>,
}

impl UploadForm {
    /// Drain a multipart body. Parts with a file name are uploads; the rest
    /// are text fields (last value wins).
    pub async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = Self::default();
        while let Some(field) = multipart.next_field().await.map_err(malformed)? {
            let name = field.name().unwrap_or_default().to_string();
            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let content_type = field.content_type().map(str::to_string);
                    let bytes = field.bytes().await.map_err(malformed)?;
                    form.files.entry(name).or_default().push(DocumentInput {
                        bytes: bytes.to_vec(),
                        content_type,
                        file_name: Some(file_name),
                    });
                }
                None => {
                    let value = field.text().await.map_err(malformed)?;
                    form.fields.insert(name, value);
                }
            }
        }
        Ok(form)
    }

    pub fn field(&self, name: &str) -> &str {
        self.fields.get(name).map(String::as_str).unwrap_or_default()
    }

    pub fn take_files(&mut self, name: &str) -> Vec<DocumentInput> {
        self.files.remove(name).unwrap_or_default()
    }
}

fn malformed(err: axum::extract::multipart::MultipartError) -> ApiError {
    tracing::warn!(error = %err, "Malformed multipart body");
    ApiError::BadRequest("リクエストの形式が正しくありません。".into())
}

/// Run a blocking service call on the blocking pool.
pub(crate) async fn run_blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Internal(format!("worker task failed: {e}")))?
}
