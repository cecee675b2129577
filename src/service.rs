//! Request-level operations: template creation, batch extraction, and
//! destination lookup. Blocking; the HTTP layer runs these on the
//! blocking pool.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use thiserror::Error;

use crate::llm::CompletionClient;
use crate::ocr::{AcquisitionError, MediaKind, TextAcquirer};
use crate::pipeline::{
    BatchResult, BatchRunner, ChunkedExtractor, DocumentInput, DocumentProcessor,
    ExtractionConfig,
};
use crate::sheets::{extract_spreadsheet_id, SinkError, TableSink};
use crate::store::{StoreError, Template, TemplateStore};
use crate::template::{TemplateAnalyzer, TemplateError};

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Uploaded file is empty")]
    EmptyUpload,

    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    #[error("Template {0} has no destination")]
    MissingDestination(String),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("Text acquisition failed: {0}")]
    Acquisition(#[from] AcquisitionError),

    #[error("Template store error: {0}")]
    Store(#[from] StoreError),

    #[error("Destination write failed: {0}")]
    Sink(#[from] SinkError),
}

/// Explicitly constructed service handles, owned by the process entry point.
pub struct SurveyService {
    acquirer: Arc<dyn TextAcquirer>,
    processor: DocumentProcessor,
    analyzer: TemplateAnalyzer,
    store: Arc<dyn TemplateStore>,
    sink: Arc<dyn TableSink>,
    request_timeout: Duration,
}

impl SurveyService {
    pub fn new(
        acquirer: Arc<dyn TextAcquirer>,
        client: Arc<dyn CompletionClient>,
        extraction: ExtractionConfig,
        store: Arc<dyn TemplateStore>,
        sink: Arc<dyn TableSink>,
        request_timeout: Duration,
    ) -> Self {
        let analyzer = TemplateAnalyzer::new(
            client.clone(),
            extraction.models().iter().map(|m| m.to_string()).collect(),
            extraction.safety,
        );
        let processor = DocumentProcessor::new(
            acquirer.clone(),
            ChunkedExtractor::new(client, extraction),
        );
        Self {
            acquirer,
            processor,
            analyzer,
            store,
            sink,
            request_timeout,
        }
    }

    /// Derive a schema from a blank survey and store it with its destination.
    pub fn analyze_template(
        &self,
        owner: &str,
        template_name: &str,
        destination_url: &str,
        document: &DocumentInput,
    ) -> Result<Template, ServiceError> {
        let template_name = required(template_name, "template_name")?;
        let destination_url = required(destination_url, "spreadsheet_url")?;
        if document.bytes.is_empty() {
            return Err(ServiceError::EmptyUpload);
        }

        let media = MediaKind::classify(
            document.content_type.as_deref(),
            document.file_name.as_deref(),
        );
        let text = match self.acquirer.acquire(&document.bytes, media) {
            Ok(text) => text,
            Err(AcquisitionError::EmptyResult) => return Err(TemplateError::NoText.into()),
            Err(e) => return Err(e.into()),
        };

        let schema = self.analyzer.derive_schema(&text)?;
        let template = Template {
            schema,
            destination: extract_spreadsheet_id(destination_url),
            created_at: Utc::now(),
        };
        self.store.put(owner, template_name, &template)?;

        tracing::info!(
            template = %template_name,
            questions = template.schema.len(),
            "Template stored"
        );
        Ok(template)
    }

    /// Extract every document against a stored template and write the rows.
    pub fn extract_batch(
        &self,
        owner: &str,
        template_name: &str,
        documents: &[DocumentInput],
    ) -> Result<BatchResult, ServiceError> {
        let template_name = required(template_name, "template_name")?;
        if documents.is_empty() {
            return Err(ServiceError::MissingField("files"));
        }

        let template = self
            .store
            .get(owner, template_name)?
            .ok_or_else(|| ServiceError::TemplateNotFound(template_name.to_string()))?;
        if template.destination.trim().is_empty() {
            return Err(ServiceError::MissingDestination(template_name.to_string()));
        }

        let deadline = Instant::now() + self.request_timeout;
        self.sink.set_header(&template.destination, &template.schema)?;

        let result = BatchRunner::new(&self.processor)
            .with_deadline(deadline)
            .run(documents, &template.schema);

        self.sink.append_rows(&template.destination, &result.rows)?;
        Ok(result)
    }

    /// Stored destination id of a template.
    pub fn get_destination(&self, owner: &str, template_name: &str) -> Result<String, ServiceError> {
        let template_name = required(template_name, "template")?;
        let template = self
            .store
            .get(owner, template_name)?
            .ok_or_else(|| ServiceError::TemplateNotFound(template_name.to_string()))?;
        if template.destination.trim().is_empty() {
            return Err(ServiceError::MissingDestination(template_name.to_string()));
        }
        Ok(template.destination)
    }
}

fn required<'a>(value: &'a str, field: &'static str) -> Result<&'a str, ServiceError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ServiceError::MissingField(field));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockCompletionClient;
    use crate::ocr::MockTextAcquirer;
    use crate::pipeline::SENTINEL;
    use crate::sheets::{MockTableSink, SinkCall};
    use crate::store::MemoryTemplateStore;

    const SURVEY_TEXT: &str = "Q1 Name: Alice\nQ2 Age: 5";

    struct Harness {
        service: SurveyService,
        store: Arc<MemoryTemplateStore>,
        sink: Arc<MockTableSink>,
    }

    fn harness(acquirer: MockTextAcquirer, client: MockCompletionClient) -> Harness {
        let store = Arc::new(MemoryTemplateStore::new());
        let sink = Arc::new(MockTableSink::new());
        let service = SurveyService::new(
            Arc::new(acquirer),
            Arc::new(client),
            ExtractionConfig::default(),
            store.clone(),
            sink.clone(),
            Duration::from_secs(60),
        );
        Harness { service, store, sink }
    }

    fn doc(bytes: &[u8]) -> DocumentInput {
        DocumentInput {
            bytes: bytes.to_vec(),
            content_type: Some("image/png".into()),
            file_name: Some("scan.png".into()),
        }
    }

    fn seed(store: &MemoryTemplateStore, destination: &str) {
        store
            .put(
                "uid-1",
                "survey",
                &Template {
                    schema: vec!["Q1 Name".into(), "Q2 Age".into()],
                    destination: destination.into(),
                    created_at: Utc::now(),
                },
            )
            .unwrap();
    }

    #[test]
    fn analyze_template_stores_schema_and_sheet_id() {
        let h = harness(
            MockTextAcquirer::new("Q1 Name ____\nQ2 Age ____"),
            MockCompletionClient::new("Q1 Name\nQ2 Age"),
        );
        let template = h
            .service
            .analyze_template(
                "uid-1",
                " survey ",
                "https://docs.google.com/spreadsheets/d/sheet123/edit",
                &doc(b"png"),
            )
            .unwrap();

        assert_eq!(template.schema, vec!["Q1 Name", "Q2 Age"]);
        let stored = h.store.get("uid-1", "survey").unwrap().unwrap();
        assert_eq!(stored.destination, "sheet123");
    }

    #[test]
    fn analyze_template_validates_inputs() {
        let h = harness(MockTextAcquirer::new("x"), MockCompletionClient::new("Q1"));
        assert!(matches!(
            h.service.analyze_template("uid-1", "", "url", &doc(b"png")),
            Err(ServiceError::MissingField("template_name"))
        ));
        assert!(matches!(
            h.service.analyze_template("uid-1", "t", " ", &doc(b"png")),
            Err(ServiceError::MissingField("spreadsheet_url"))
        ));
        assert!(matches!(
            h.service.analyze_template("uid-1", "t", "url", &doc(b"")),
            Err(ServiceError::EmptyUpload)
        ));
    }

    #[test]
    fn blank_template_scan_is_no_text() {
        let h = harness(MockTextAcquirer::new("   "), MockCompletionClient::new("Q1"));
        assert!(matches!(
            h.service.analyze_template("uid-1", "t", "url", &doc(b"png")),
            Err(ServiceError::Template(TemplateError::NoText))
        ));
    }

    #[test]
    fn extract_batch_writes_header_then_rows() {
        let h = harness(
            MockTextAcquirer::new(SURVEY_TEXT),
            MockCompletionClient::new(r#"["Alice", "5"]"#),
        );
        seed(&h.store, "sheet123");

        let result = h
            .service
            .extract_batch("uid-1", "survey", &[doc(b"png"), doc(b"")])
            .unwrap();
        assert_eq!(result.processed_count, 1);
        assert_eq!(result.failed_count, 1);

        let calls = h.sink.calls();
        assert_eq!(
            calls[0],
            SinkCall::Header {
                destination: "sheet123".into(),
                header: vec!["Q1 Name".into(), "Q2 Age".into()],
            }
        );
        match &calls[1] {
            SinkCall::Append { destination, rows } => {
                assert_eq!(destination, "sheet123");
                assert_eq!(rows[0], vec!["Alice", "5"]);
                assert_eq!(rows[1], vec![SENTINEL; 2]);
            }
            other => panic!("unexpected call: {other:?}"),
        }
    }

    #[test]
    fn extract_batch_requires_known_template_with_destination() {
        let h = harness(MockTextAcquirer::new(SURVEY_TEXT), MockCompletionClient::new("[]"));
        assert!(matches!(
            h.service.extract_batch("uid-1", "survey", &[doc(b"png")]),
            Err(ServiceError::TemplateNotFound(_))
        ));

        seed(&h.store, "");
        assert!(matches!(
            h.service.extract_batch("uid-1", "survey", &[doc(b"png")]),
            Err(ServiceError::MissingDestination(_))
        ));
        assert!(matches!(
            h.service.extract_batch("uid-1", "survey", &[]),
            Err(ServiceError::MissingField("files"))
        ));
        assert!(h.sink.calls().is_empty());
    }

    #[test]
    fn templates_are_scoped_by_owner() {
        let h = harness(MockTextAcquirer::new(SURVEY_TEXT), MockCompletionClient::new("[]"));
        seed(&h.store, "sheet123");
        assert_eq!(h.service.get_destination("uid-1", "survey").unwrap(), "sheet123");
        assert!(matches!(
            h.service.get_destination("uid-2", "survey"),
            Err(ServiceError::TemplateNotFound(_))
        ));
    }
}
