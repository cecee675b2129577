//! Per-document orchestration and batch aggregation.
//!
//! acquire → sanitize → segment → context → extract → align, one document
//! at a time. A failing document becomes a sentinel row; it never aborts
//! the batch.

use std::sync::Arc;
use std::time::Instant;

use super::align::{align, sentinel_row};
use super::extractor::ChunkedExtractor;
use super::types::{AnswerVector, BatchResult, DocumentInput};
use super::PipelineError;
use crate::ocr::{AcquisitionError, MediaKind, TextAcquirer};

/// Drives one document from bytes to an aligned answer row.
pub struct DocumentProcessor {
    acquirer: Arc<dyn TextAcquirer>,
    extractor: ChunkedExtractor,
}

impl DocumentProcessor {
    pub fn new(acquirer: Arc<dyn TextAcquirer>, extractor: ChunkedExtractor) -> Self {
        Self {
            acquirer,
            extractor,
        }
    }

    /// Full pipeline for one document, surfacing acquisition failures.
    pub fn try_process_document(
        &self,
        document: &DocumentInput,
        schema: &[String],
    ) -> Result<AnswerVector, PipelineError> {
        if document.bytes.is_empty() {
            return Err(PipelineError::EmptyDocument);
        }

        let media = MediaKind::classify(
            document.content_type.as_deref(),
            document.file_name.as_deref(),
        );
        let text = self.acquirer.acquire(&document.bytes, media)?;
        if text.trim().is_empty() {
            return Err(AcquisitionError::EmptyResult.into());
        }

        let raw = self.extractor.extract(&text, schema);
        Ok(align(raw.into_iter().map(Some), schema.len()))
    }

    /// Same as [`try_process_document`](Self::try_process_document) but a
    /// failure is logged and turned into a full-sentinel row.
    pub fn process_document(&self, document: &DocumentInput, schema: &[String]) -> AnswerVector {
        self.try_process_document(document, schema)
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Document failed, emitting sentinel row");
                sentinel_row(schema.len())
            })
    }
}

/// Runs a request's documents sequentially and keeps the counters.
pub struct BatchRunner<'a> {
    processor: &'a DocumentProcessor,
    deadline: Option<Instant>,
}

impl<'a> BatchRunner<'a> {
    pub fn new(processor: &'a DocumentProcessor) -> Self {
        Self {
            processor,
            deadline: None,
        }
    }

    /// Documents not started by `deadline` are skipped. In-flight work
    /// is never interrupted.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn run(&self, documents: &[DocumentInput], schema: &[String]) -> BatchResult {
        let start = Instant::now();
        let mut result = BatchResult::empty();

        for (doc_index, document) in documents.iter().enumerate() {
            if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                result.skipped_count = (documents.len() - doc_index) as u32;
                tracing::warn!(
                    skipped = result.skipped_count,
                    completed = doc_index,
                    "Request deadline reached, skipping remaining documents"
                );
                break;
            }

            let _span = tracing::info_span!(
                "process_document",
                doc_index,
                size = document.bytes.len(),
            )
            .entered();

            match self.processor.try_process_document(document, schema) {
                Ok(row) => {
                    result.processed_count += 1;
                    result.rows.push(row);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Document failed, emitting sentinel row");
                    result.failed_count += 1;
                    result.rows.push(sentinel_row(schema.len()));
                }
            }
        }

        tracing::info!(
            processed = result.processed_count,
            failed = result.failed_count,
            skipped = result.skipped_count,
            elapsed_ms = %start.elapsed().as_millis(),
            "Batch complete"
        );
        result
    }
}
