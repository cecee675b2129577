//! Google Cloud Vision REST acquirer.
//!
//! Images use `images:annotate`. PDF and TIFF uploads are staged in the
//! temp bucket, recognized with `files:asyncBatchAnnotate`, and read back
//! from the JSON files Vision writes under an output prefix.

use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::Engine as _;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use super::storage::{ObjectStore, TempObjects};
use super::{AcquisitionError, MediaKind, TextAcquirer};
use crate::google::{truncate_body, GoogleAuth};

const DEFAULT_VISION_URL: &str = "https://vision.googleapis.com/v1";
const FEATURE_TYPE: &str = "DOCUMENT_TEXT_DETECTION";
/// Pages per output JSON file.
const OUTPUT_BATCH_SIZE: u32 = 20;
const POLL_INTERVAL: Duration = Duration::from_secs(3);

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnotateResponse {
    full_text_annotation: Option<TextAnnotation>,
    error: Option<Status>,
}

#[derive(Debug, Default, Deserialize)]
struct TextAnnotation {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Default, Deserialize)]
struct Status {
    #[serde(default)]
    code: i32,
    #[serde(default)]
    message: String,
}

/// Body of `images:annotate` and of each async output file.
#[derive(Debug, Default, Deserialize)]
struct BatchAnnotateResponse {
    #[serde(default)]
    responses: Vec<AnnotateResponse>,
}

#[derive(Debug, Deserialize)]
struct Operation {
    name: String,
    #[serde(default)]
    done: bool,
    error: Option<Status>,
}

pub struct GoogleVisionAcquirer {
    base_url: String,
    auth: GoogleAuth,
    client: reqwest::blocking::Client,
    store: Arc<dyn ObjectStore>,
    temp_bucket: Option<String>,
    request_timeout_secs: u64,
    job_timeout: Duration,
}

impl GoogleVisionAcquirer {
    pub fn new(
        auth: GoogleAuth,
        store: Arc<dyn ObjectStore>,
        temp_bucket: Option<String>,
        request_timeout_secs: u64,
        job_timeout_secs: u64,
    ) -> Result<Self, AcquisitionError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(request_timeout_secs))
            .build()
            .map_err(|e| AcquisitionError::Config(e.to_string()))?;
        Ok(Self {
            base_url: DEFAULT_VISION_URL.to_string(),
            auth,
            client,
            store,
            temp_bucket: temp_bucket.filter(|b| !b.trim().is_empty()),
            request_timeout_secs,
            job_timeout: Duration::from_secs(job_timeout_secs),
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn send_json<T: DeserializeOwned>(
        &self,
        request: reqwest::blocking::RequestBuilder,
    ) -> Result<T, AcquisitionError> {
        let response = self.auth.apply(request).send().map_err(|e| {
            if e.is_timeout() {
                AcquisitionError::Timeout {
                    secs: self.request_timeout_secs,
                }
            } else {
                AcquisitionError::Upstream(e.to_string())
            }
        })?;
        let status = response.status();
        let body = response
            .text()
            .map_err(|e| AcquisitionError::Upstream(e.to_string()))?;
        if !status.is_success() {
            return Err(AcquisitionError::Upstream(format!(
                "status {}: {}",
                status.as_u16(),
                truncate_body(body)
            )));
        }
        serde_json::from_str(&body)
            .map_err(|e| AcquisitionError::Upstream(format!("unexpected response: {e}")))
    }

    fn recognize_image(&self, bytes: &[u8]) -> Result<String, AcquisitionError> {
        let body = json!({
            "requests": [{
                "image": { "content": base64::engine::general_purpose::STANDARD.encode(bytes) },
                "features": [{ "type": FEATURE_TYPE }],
            }]
        });
        let batch: BatchAnnotateResponse = self.send_json(
            self.client
                .post(format!("{}/images:annotate", self.base_url))
                .json(&body),
        )?;

        let response = batch.responses.into_iter().next().unwrap_or_default();
        if let Some(status) = response.error.filter(|s| !s.message.is_empty()) {
            return Err(AcquisitionError::Upstream(format!(
                "code {}: {}",
                status.code, status.message
            )));
        }
        let text = response
            .full_text_annotation
            .map(|a| a.text.trim().to_string())
            .unwrap_or_default();
        if text.is_empty() {
            return Err(AcquisitionError::EmptyResult);
        }
        Ok(text)
    }

    /// Start the async job and poll it until done or the job timeout.
    fn run_async_job(
        &self,
        source_uri: &str,
        destination_uri: &str,
        media: MediaKind,
    ) -> Result<(), AcquisitionError> {
        let body = json!({
            "requests": [{
                "inputConfig": {
                    "gcsSource": { "uri": source_uri },
                    "mimeType": media.mime_type(),
                },
                "features": [{ "type": FEATURE_TYPE }],
                "outputConfig": {
                    "gcsDestination": { "uri": destination_uri },
                    "batchSize": OUTPUT_BATCH_SIZE,
                },
            }]
        });
        let mut operation: Operation = self.send_json(
            self.client
                .post(format!("{}/files:asyncBatchAnnotate", self.base_url))
                .json(&body),
        )?;
        tracing::debug!(operation = %operation.name, "Async recognition started");

        let deadline = Instant::now() + self.job_timeout;
        loop {
            if operation.done {
                return match operation.error {
                    Some(status) => Err(AcquisitionError::Upstream(format!(
                        "code {}: {}",
                        status.code, status.message
                    ))),
                    None => Ok(()),
                };
            }
            if Instant::now() >= deadline {
                return Err(AcquisitionError::Timeout {
                    secs: self.job_timeout.as_secs(),
                });
            }
            std::thread::sleep(POLL_INTERVAL);
            operation = self.send_json(
                self.client
                    .get(format!("{}/{}", self.base_url, operation.name)),
            )?;
        }
    }
}

impl TextAcquirer for GoogleVisionAcquirer {
    fn acquire(&self, bytes: &[u8], media: MediaKind) -> Result<String, AcquisitionError> {
        let _span = tracing::info_span!("acquire_text", media = ?media, size = bytes.len()).entered();
        let start = Instant::now();

        let text = if media.is_paginated() {
            let bucket = self.temp_bucket.as_deref().ok_or_else(|| {
                AcquisitionError::Config("TEMP_BUCKET is required for PDF/TIFF recognition".into())
            })?;
            recognize_via_store(&self.store, bucket, bytes, media, |src, dst| {
                self.run_async_job(src, dst, media)
            })?
        } else {
            self.recognize_image(bytes)?
        };

        tracing::info!(
            elapsed_ms = %start.elapsed().as_millis(),
            text_len = text.len(),
            "Text acquired"
        );
        Ok(text)
    }
}

/// Stage `bytes` in `bucket`, run the job, and collect the page texts.
///
/// The uploaded source and every output object are deleted when this
/// returns, whichever way it returns.
fn recognize_via_store<F>(
    store: &Arc<dyn ObjectStore>,
    bucket: &str,
    bytes: &[u8],
    media: MediaKind,
    run_job: F,
) -> Result<String, AcquisitionError>
where
    F: FnOnce(&str, &str) -> Result<(), AcquisitionError>,
{
    let job_id = Uuid::new_v4().simple().to_string();
    let source = format!("uploads/{job_id}.{}", media.extension());
    let output_prefix = format!("vision-out/{job_id}/");

    let mut temp = TempObjects::new(store.clone(), bucket);
    store.upload(bucket, &source, bytes, media.mime_type())?;
    temp.track(source.as_str());

    let job_result = run_job(
        &format!("gs://{bucket}/{source}"),
        &format!("gs://{bucket}/{output_prefix}"),
    );

    // Partial output from a failed job is cleaned up too. A listing failure
    // must not mask the job's own error.
    let listed = store.list(bucket, &output_prefix);
    match &listed {
        Ok(names) => {
            for name in names {
                temp.track(name.as_str());
            }
        }
        Err(e) => tracing::warn!(prefix = %output_prefix, error = %e, "Failed to list recognition output"),
    }
    job_result?;
    let mut outputs = listed?;

    outputs.retain(|name| name.ends_with(".json"));
    if outputs.is_empty() {
        return Err(AcquisitionError::OutputNotFound {
            prefix: format!("gs://{bucket}/{output_prefix}"),
        });
    }
    outputs.sort_by_key(|name| (first_page(name).unwrap_or(u32::MAX), name.clone()));

    let mut pages = Vec::new();
    for name in &outputs {
        let raw = store.download(bucket, name)?;
        let batch: BatchAnnotateResponse = serde_json::from_slice(&raw)
            .map_err(|e| AcquisitionError::Upstream(format!("invalid output {name}: {e}")))?;
        for response in batch.responses {
            if let Some(status) = response.error.filter(|s| !s.message.is_empty()) {
                tracing::warn!(code = status.code, message = %status.message, "Page recognition failed");
                continue;
            }
            if let Some(annotation) = response.full_text_annotation {
                if !annotation.text.is_empty() {
                    pages.push(annotation.text);
                }
            }
        }
    }

    let text = pages.join("\n").trim().to_string();
    if text.is_empty() {
        return Err(AcquisitionError::EmptyResult);
    }
    Ok(text)
}

/// First page number of an output file (`output-21-to-40.json` → 21).
fn first_page(name: &str) -> Option<u32> {
    let file = name.rsplit('/').next()?;
    let rest = file.strip_prefix("output-")?;
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}
